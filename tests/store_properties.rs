// tests/store_properties.rs

//! Store-wide properties: round trips, exclusion of bad writes, version
//! ordering during cleanup, and concurrent sessions.

mod common;

use common::{TESTDATA_HASH, entry_count, open_store, write_package};
use std::io::Write;
use std::sync::Arc;
use upgrade_store::{Error, FixedArchInspector, PackageStore, StoreConfig, hash};

#[tokio::test]
async fn test_round_trip_various_contents() {
    let (_temp_dir, store) = open_store("1.0.0").await;

    let large: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    let contents: Vec<(&str, Vec<u8>)> = vec![
        ("empty.apk", Vec::new()),
        ("small.apk", b"x".to_vec()),
        ("large.apk", large),
    ];

    for (name, content) in &contents {
        let record = write_package(&store, name, "2.0.0", content).await;
        assert_eq!(record.size, content.len() as u64);

        let data = store
            .read_by_hash(&record.hash)
            .await
            .unwrap()
            .read_to_vec()
            .await
            .unwrap();
        assert_eq!(&data, content, "round trip failed for {name}");
    }

    assert_eq!(store.list_available_upgrades().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_chunked_writes_match_single_write() {
    let (_temp_dir, store) = open_store("1.0.0").await;

    let mut session = store
        .begin_write("foo.apk", "3.0.0", TESTDATA_HASH)
        .await
        .unwrap();
    for chunk in [&b"te"[..], b"st", b"", b"data"] {
        session.write(chunk).await.unwrap();
    }
    assert_eq!(session.bytes_written(), 8);
    let record = session.finish().await.unwrap();
    assert_eq!(record.hash, TESTDATA_HASH);
}

#[tokio::test]
async fn test_expected_hash_is_case_insensitive() {
    let (_temp_dir, store) = open_store("1.0.0").await;

    let mut session = store
        .begin_write("foo.apk", "3.0.0", &TESTDATA_HASH.to_uppercase())
        .await
        .unwrap();
    session.write(b"testdata").await.unwrap();
    let record = session.finish().await.unwrap();

    assert_eq!(record.hash, TESTDATA_HASH);
    assert!(store.read_by_hash(&TESTDATA_HASH.to_uppercase()).await.is_ok());
}

#[tokio::test]
async fn test_mismatch_never_reachable() {
    let (temp_dir, store) = open_store("1.0.0").await;
    let other_hash = hash::hash_bytes(b"other content");

    let mut session = store
        .begin_write("foo.apk", "3.0.0", other_hash.as_str())
        .await
        .unwrap();
    session.write(b"testdata").await.unwrap();
    assert!(session.finish().await.unwrap_err().is_hash_mismatch());

    assert!(store.list_available_upgrades().await.unwrap().is_empty());
    assert!(store.read_by_hash(TESTDATA_HASH).await.err().unwrap().is_not_found());
    assert!(store.read_by_hash(other_hash.as_str()).await.err().unwrap().is_not_found());
    assert_eq!(entry_count(&temp_dir.path().join("tmp")), 0);
}

#[tokio::test]
async fn test_dropped_session_leaves_nothing() {
    let (temp_dir, store) = open_store("1.0.0").await;

    {
        let mut session = store
            .begin_write("foo.apk", "3.0.0", TESTDATA_HASH)
            .await
            .unwrap();
        session.write(b"test").await.unwrap();
        assert_eq!(entry_count(&temp_dir.path().join("tmp")), 1);
    }

    assert_eq!(entry_count(&temp_dir.path().join("tmp")), 0);
    assert!(store.list_available_upgrades().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_obsolete_follows_version_order() {
    let cases = [
        ("2.0.0", "1.9.9", false),
        ("2.0.0", "2.0.0", false),
        ("2.0.0", "2.0.1", true),
        ("2.0.0", "10.0.0", true),
        ("1.9.0", "1.10.0", true),
        ("1.10.0", "1.9.0", false),
        ("2.0.0", "2.0.0-beta", false),
        ("3.1", "3.1.0.1", true),
        ("3.1.0.1", "3.1", false),
    ];

    for (installed, candidate, kept) in cases {
        let (temp_dir, store) = open_store(installed).await;
        write_package(&store, "pkg.apk", candidate, candidate.as_bytes()).await;

        let report = store.clear_obsolete().await.unwrap();
        let still_there = temp_dir.path().join("pkg.apk").exists();
        assert_eq!(
            still_there, kept,
            "installed {installed}, candidate {candidate}: expected kept={kept}"
        );
        assert_eq!(report.kept.len(), usize::from(kept));
        assert_eq!(report.removed.len(), usize::from(!kept));
        assert_eq!(store.list_available_upgrades().await.unwrap().len(), usize::from(kept));
    }
}

#[tokio::test]
async fn test_clear_obsolete_mixed_set() {
    let (_temp_dir, store) = open_store("2.0.0").await;
    write_package(&store, "old.apk", "1.0.0", b"old").await;
    write_package(&store, "same.apk", "2.0.0", b"same").await;
    write_package(&store, "new.apk", "2.1.0", b"new").await;

    let report = store.clear_obsolete().await.unwrap();
    let mut removed: Vec<_> = report.removed.iter().map(|r| r.filename.as_str()).collect();
    removed.sort();
    assert_eq!(removed, vec!["old.apk", "same.apk"]);

    let remaining = store.list_available_upgrades().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].filename, "new.apk");
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let (_temp_dir, store) = open_store("1.0.0").await;

    let good = hash::hash_bytes(b"first package");
    let mut first = store.begin_write("a.apk", "2.0.0", good.as_str()).await.unwrap();
    let mut second = store.begin_write("b.apk", "2.0.0", "fakehash").await.unwrap();

    first.write(b"first ").await.unwrap();
    second.write(b"second package").await.unwrap();
    first.write(b"package").await.unwrap();

    // An open session is invisible to listing
    assert!(store.list_available_upgrades().await.unwrap().is_empty());

    assert!(second.finish().await.unwrap_err().is_hash_mismatch());
    let record = first.finish().await.unwrap();

    let listed = store.list_available_upgrades().await.unwrap();
    assert_eq!(listed, vec![record]);
}

#[tokio::test]
async fn test_parallel_writes_from_tasks() {
    let (_temp_dir, store) = open_store("1.0.0").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let content = format!("package number {i}").into_bytes();
            write_package(&store, &format!("pkg-{i}.apk"), "2.0.0", &content).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let listed = store.list_available_upgrades().await.unwrap();
    assert_eq!(listed.len(), 8);
    assert_eq!(listed[0].filename, "pkg-0.apk");
    assert_eq!(listed[7].filename, "pkg-7.apk");
}

#[tokio::test]
async fn test_listing_is_deterministic() {
    let (_temp_dir, store) = open_store("1.0.0").await;
    write_package(&store, "c.apk", "2.0.0", b"c").await;
    write_package(&store, "a.apk", "2.0.0", b"a").await;
    write_package(&store, "b.apk", "2.0.0", b"b").await;

    let first = store.list_available_upgrades().await.unwrap();
    let second = store.list_available_upgrades().await.unwrap();
    assert_eq!(first, second);

    let names: Vec<_> = first.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["a.apk", "b.apk", "c.apk"]);
}

#[tokio::test]
async fn test_same_name_different_content_rejected() {
    let (_temp_dir, store) = open_store("1.0.0").await;
    let original = write_package(&store, "foo.apk", "3.0.0", b"testdata").await;

    let other = hash::hash_bytes(b"different");
    let mut session = store.begin_write("foo.apk", "3.0.0", other.as_str()).await.unwrap();
    session.write(b"different").await.unwrap();
    let err = session.finish().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(ref name) if name == "foo.apk"));

    assert_eq!(store.list_available_upgrades().await.unwrap(), vec![original]);
    let data = store
        .read_by_hash(TESTDATA_HASH)
        .await
        .unwrap()
        .read_to_vec()
        .await
        .unwrap();
    assert_eq!(data, b"testdata");
}

#[tokio::test]
async fn test_same_name_same_content_is_idempotent() {
    let (temp_dir, store) = open_store("1.0.0").await;
    let first = write_package(&store, "foo.apk", "3.0.0", b"testdata").await;
    let second = write_package(&store, "foo.apk", "3.0.0", b"testdata").await;

    assert_eq!(first, second);
    assert_eq!(store.list_available_upgrades().await.unwrap().len(), 1);
    assert_eq!(entry_count(&temp_dir.path().join("tmp")), 0);
}

#[tokio::test]
async fn test_same_name_same_content_new_version_rejected() {
    let (_temp_dir, store) = open_store("1.0.0").await;
    let original = write_package(&store, "foo.apk", "3.0.0", b"testdata").await;

    let mut session = store
        .begin_write("foo.apk", "3.1.0", TESTDATA_HASH)
        .await
        .unwrap();
    session.write(b"testdata").await.unwrap();
    let err = session.finish().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(ref name) if name == "foo.apk"));

    let listed = store.list_available_upgrades().await.unwrap();
    assert_eq!(listed, vec![original]);
    assert_eq!(listed[0].version, "3.0.0");
}

#[tokio::test]
async fn test_rewrite_after_interrupted_removal() {
    let (temp_dir, store) = open_store("1.0.0").await;
    write_package(&store, "foo.apk", "3.0.0", b"testdata").await;

    // Removal got as far as the package file
    std::fs::remove_file(temp_dir.path().join("foo.apk")).unwrap();
    assert!(store.list_available_upgrades().await.unwrap().is_empty());

    let record = write_package(&store, "foo.apk", "3.0.0", b"testdata").await;
    assert!(temp_dir.path().join("foo.apk.meta.json").exists());
    assert_eq!(store.list_available_upgrades().await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_begin_write_validates_inputs() {
    let (_temp_dir, store) = open_store("1.0.0").await;

    for name in ["", "tmp", "../foo.apk", "dir/foo.apk", ".hidden", "foo.apk.meta.json"] {
        let result = store.begin_write(name, "1.0.0", TESTDATA_HASH).await;
        assert!(
            matches!(result, Err(Error::Validation(_))),
            "name {name:?} should be rejected"
        );
    }

    for version in ["", "1..0", "1.0 beta"] {
        let result = store.begin_write("foo.apk", version, TESTDATA_HASH).await;
        assert!(
            matches!(result, Err(Error::Validation(_))),
            "version {version:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_read_unknown_hash_is_not_found() {
    let (_temp_dir, store) = open_store("1.0.0").await;
    let err = store.read_by_hash(TESTDATA_HASH).await.err().unwrap();
    assert!(matches!(err, Error::NotFound(ref h) if h == TESTDATA_HASH));
}

#[tokio::test]
async fn test_remove_by_hash() {
    let (temp_dir, store) = open_store("1.0.0").await;
    write_package(&store, "foo.apk", "3.0.0", b"testdata").await;
    write_package(&store, "bar.apk", "3.0.0", b"bar").await;

    let removed = store.remove_by_hash(TESTDATA_HASH).await.unwrap();
    assert_eq!(removed.filename, "foo.apk");
    assert!(!temp_dir.path().join("foo.apk").exists());
    assert!(!temp_dir.path().join("foo.apk.meta.json").exists());

    let remaining = store.list_available_upgrades().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].filename, "bar.apk");

    assert!(store.remove_by_hash(TESTDATA_HASH).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_compatible_upgrades_filters_version_and_arch() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = PackageStore::open(temp_dir.path(), StoreConfig::new("2.0.0"))
        .await
        .unwrap()
        .with_inspector(Arc::new(FixedArchInspector::new(["x86_64"])));

    write_package(&store, "newer.apk", "2.1.0", b"newer").await;
    write_package(&store, "older.apk", "1.0.0", b"older").await;

    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("foreign.bin");
    std::fs::write(&source, b"x86 only build").unwrap();
    let foreign = store.import_existing(&source, "3.0.0").await.unwrap();
    assert_eq!(foreign.arch, vec!["x86_64"]);

    let compatible = store.compatible_upgrades().await.unwrap();
    assert_eq!(compatible.len(), 1);
    assert_eq!(compatible[0].filename, "newer.apk");
    assert_eq!(store.list_available_upgrades().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_import_detects_native_abis() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = PackageStore::open(temp_dir.path().join("store"), StoreConfig::new("1.0.0"))
        .await
        .unwrap();

    let apk = temp_dir.path().join("app.apk");
    {
        let file = std::fs::File::create(&apk).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for entry in ["classes.dex", "lib/armeabi-v7a/libapp.so", "lib/arm64-v8a/libapp.so"] {
            zip.start_file(entry, zip::write::FileOptions::default()).unwrap();
            zip.write_all(b"payload").unwrap();
        }
        zip.finish().unwrap();
    }

    let record = store.import_existing(&apk, "2.0.0").await.unwrap();
    assert_eq!(record.arch, vec!["arm64-v8a", "armeabi-v7a"]);
    assert_eq!(record.filename, format!("{}.apk", record.hash));

    let expected = std::fs::read(&apk).unwrap();
    let data = store
        .read_by_hash(&record.hash)
        .await
        .unwrap()
        .read_to_vec()
        .await
        .unwrap();
    assert_eq!(data, expected);
}

#[tokio::test]
async fn test_import_twice_is_idempotent() {
    let (_temp_dir, store) = open_store("1.0.0").await;
    let first = store
        .import_existing(common::fixture("fake.apk"), "1.2.3")
        .await
        .unwrap();
    let second = store
        .import_existing(common::fixture("fake.apk"), "1.2.3")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.list_available_upgrades().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_failures_are_surfaced() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (_store_dir, store) = open_store("1.0.0").await;

    let missing = store
        .import_existing(temp_dir.path().join("missing.apk"), "1.0.0")
        .await
        .unwrap_err();
    assert!(matches!(missing, Error::Io(_)));

    let empty = temp_dir.path().join("empty.apk");
    std::fs::write(&empty, b"").unwrap();
    let invalid = store.import_existing(&empty, "1.0.0").await.unwrap_err();
    assert!(matches!(invalid, Error::Validation(_)));

    let bad_version = store
        .import_existing(common::fixture("fake.apk"), "not..a.version")
        .await
        .unwrap_err();
    assert!(matches!(bad_version, Error::Validation(_)));

    assert!(store.list_available_upgrades().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_open_rejects_bad_config() {
    let temp_dir = tempfile::tempdir().unwrap();

    let bad_version = PackageStore::open(temp_dir.path(), StoreConfig::new("")).await;
    assert!(matches!(bad_version, Err(Error::Validation(_))));

    let bad_platform =
        PackageStore::open(temp_dir.path(), StoreConfig::new("1.0.0").with_platform("ios")).await;
    assert!(matches!(bad_platform, Err(Error::Validation(_))));
}
