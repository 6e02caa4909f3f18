use std::io::{Cursor, Write};
use std::path::Path;

use depot_publish::{
    DatasetStore, LatestPointer, LatestWriter, PublishConfig, PublishError, Publisher,
};
use tempfile::{TempDir, tempdir};
use url::Url;
use zip::write::SimpleFileOptions;

struct Harness {
    _root: TempDir,
    publisher: Publisher,
    config: PublishConfig,
}

fn harness(tune: impl FnOnce(PublishConfig) -> PublishConfig) -> Harness {
    let root = tempdir().unwrap();
    let config = tune(PublishConfig::new(
        root.path().join("data"),
        root.path().join("staging"),
    ));
    Harness {
        publisher: Publisher::new(config.clone()),
        config,
        _root: root,
    }
}

fn bundle_zip(bundle_id: &str) -> Vec<u8> {
    zip_of(&[
        (
            &format!("{bundle_id}/manifest.json"),
            format!(r#"{{"bundleId":"{bundle_id}"}}"#).into_bytes(),
        ),
        (&format!("{bundle_id}/model.json"), br#"{"m":1}"#.to_vec()),
        (&format!("{bundle_id}/indexes.json"), br#"{"i":2}"#.to_vec()),
    ])
}

fn zip_of(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn staging_is_empty(config: &PublishConfig) -> bool {
    match std::fs::read_dir(&config.staging_root) {
        Ok(entries) => entries.count() == 0,
        Err(_) => true,
    }
}

#[test]
fn stage_returns_bundle_id_from_manifest() {
    let h = harness(|c| c);
    let bundle = h.publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    assert_eq!(bundle.bundle_id(), "b1");
    assert!(bundle.manifest_path().ends_with("manifest.json"));
    assert!(bundle.model_path().ends_with("model.json"));
    assert!(bundle.indexes_path().ends_with("indexes.json"));
}

#[test]
fn publish_happy_path_creates_durable_layout() {
    let h = harness(|c| c);
    let bundle = h.publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    let receipt = h.publisher.publish("ds1", bundle, Some("Sample")).unwrap();

    assert_eq!(receipt.dataset_id, "ds1");
    assert_eq!(receipt.bundle_id, "b1");
    assert!(receipt.latest_url.is_none());
    assert!(receipt.manifest_url.is_none());

    let bundle_dir = h.config.data_root.join("bundles/b1");
    for doc in ["manifest.json", "model.json", "indexes.json"] {
        assert!(bundle_dir.join(doc).is_file(), "{doc} should be durable");
    }

    let store = h.publisher.store();
    let latest = store.read_latest("ds1").unwrap().unwrap();
    assert_eq!(latest.bundle_id, "b1");
    assert_eq!(latest.dataset_id, "ds1");
    assert_eq!(latest.published_at, receipt.published_at);
    assert_eq!(latest.manifest_url, "../../bundles/b1/manifest.json");

    let dataset = store.read_dataset("ds1").unwrap().unwrap();
    assert_eq!(dataset.title, "Sample");
    assert_eq!(dataset.created_at, receipt.published_at);

    let releases = store.read_releases("ds1").unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].bundle_id, "b1");

    assert!(staging_is_empty(&h.config));
}

#[test]
fn second_publish_updates_pointer_and_keeps_created_at() {
    let h = harness(|c| c);
    let store = h.publisher.store();

    let bundle = h.publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    h.publisher.publish("ds1", bundle, Some("Sample")).unwrap();
    let first = store.read_dataset("ds1").unwrap().unwrap();

    let bundle = h.publisher.stage("ds1", bundle_zip("b2").as_slice()).unwrap();
    h.publisher.publish("ds1", bundle, None).unwrap();
    let second = store.read_dataset("ds1").unwrap().unwrap();

    // Title survives a publish without one; createdAt never moves.
    assert_eq!(second.title, "Sample");
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);

    let latest = store.read_latest("ds1").unwrap().unwrap();
    assert_eq!(latest.bundle_id, "b2");

    let releases = store.read_releases("ds1").unwrap();
    let ids: Vec<_> = releases.iter().map(|r| r.bundle_id.as_str()).collect();
    assert_eq!(ids, ["b1", "b2"]);
}

#[test]
fn duplicate_bundle_id_conflicts_at_staging() {
    let h = harness(|c| c);
    let bundle = h.publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    h.publisher.publish("ds1", bundle, None).unwrap();

    let result = h.publisher.stage("ds1", bundle_zip("b1").as_slice());
    assert!(matches!(result, Err(PublishError::Conflict(msg)) if msg.contains("b1")));
    assert!(staging_is_empty(&h.config));

    // Exactly one bundle directory for the id exists afterwards.
    let entries: Vec<_> = std::fs::read_dir(h.config.data_root.join("bundles"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, ["b1"]);
}

#[test]
fn duplicate_bundle_id_conflicts_at_commit() {
    let h = harness(|c| c);
    // Stage both before either publishes, so the staging pre-check passes.
    let first = h.publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    let second = h.publisher.stage("ds2", bundle_zip("b1").as_slice()).unwrap();

    h.publisher.publish("ds1", first, None).unwrap();
    let result = h.publisher.publish("ds2", second, None);
    assert!(matches!(result, Err(PublishError::Conflict(_))));

    // The winner's bundle is untouched and still pointed at.
    let latest = h.publisher.store().read_latest("ds1").unwrap().unwrap();
    assert_eq!(latest.bundle_id, "b1");
    assert!(h.config.data_root.join("bundles/b1/manifest.json").is_file());
    assert!(staging_is_empty(&h.config));
}

#[test]
fn missing_manifest_is_distinct_from_multiple() {
    let h = harness(|c| c);

    let no_manifest = zip_of(&[("b1/model.json", b"{}".to_vec())]);
    let err = h.publisher.stage("ds1", no_manifest.as_slice()).unwrap_err();
    assert!(matches!(&err, PublishError::Validation(msg) if msg.contains("missing manifest.json")));

    let two_manifests = zip_of(&[
        ("a/manifest.json", br#"{"bundleId":"a"}"#.to_vec()),
        ("b/manifest.json", br#"{"bundleId":"b"}"#.to_vec()),
    ]);
    let err = h.publisher.stage("ds1", two_manifests.as_slice()).unwrap_err();
    assert!(matches!(&err, PublishError::Validation(msg) if msg.contains("multiple manifest.json")));

    assert!(staging_is_empty(&h.config));
}

#[test]
fn missing_companions_name_the_missing_document() {
    let h = harness(|c| c);

    let no_model = zip_of(&[
        ("b1/manifest.json", br#"{"bundleId":"b1"}"#.to_vec()),
        ("b1/indexes.json", b"{}".to_vec()),
    ]);
    let err = h.publisher.stage("ds1", no_model.as_slice()).unwrap_err();
    assert!(matches!(&err, PublishError::Validation(msg) if msg.contains("model.json")));

    let no_indexes = zip_of(&[
        ("b1/manifest.json", br#"{"bundleId":"b1"}"#.to_vec()),
        ("b1/model.json", b"{}".to_vec()),
    ]);
    let err = h.publisher.stage("ds1", no_indexes.as_slice()).unwrap_err();
    assert!(matches!(&err, PublishError::Validation(msg) if msg.contains("indexes.json")));
}

#[test]
fn malformed_document_fails_validation() {
    let h = harness(|c| c);
    let bad_model = zip_of(&[
        ("b1/manifest.json", br#"{"bundleId":"b1"}"#.to_vec()),
        ("b1/model.json", b"{ definitely not json".to_vec()),
        ("b1/indexes.json", b"{}".to_vec()),
    ]);
    let err = h.publisher.stage("ds1", bad_model.as_slice()).unwrap_err();
    assert!(matches!(&err, PublishError::Validation(msg) if msg.contains("model.json")));
    assert!(staging_is_empty(&h.config));
}

#[test]
fn oversized_upload_reports_too_large() {
    let h = harness(|c| c.max_archive_bytes(256));
    let err = h
        .publisher
        .stage("ds1", bundle_zip("a-bundle-with-some-name").as_slice())
        .unwrap_err();
    assert!(matches!(err, PublishError::TooLarge(_)));
    assert!(staging_is_empty(&h.config));
}

#[test]
fn oversized_document_reports_too_large() {
    let h = harness(|c| c.max_document_bytes(64));
    let big_model = zip_of(&[
        ("b1/manifest.json", br#"{"bundleId":"b1"}"#.to_vec()),
        (
            "b1/model.json",
            format!(r#"{{"pad":"{}"}}"#, "x".repeat(512)).into_bytes(),
        ),
        ("b1/indexes.json", b"{}".to_vec()),
    ]);
    let err = h.publisher.stage("ds1", big_model.as_slice()).unwrap_err();
    assert!(matches!(err, PublishError::TooLarge(_)));
}

#[test]
fn invalid_dataset_id_is_rejected() {
    let h = harness(|c| c);
    let err = h
        .publisher
        .stage("Not A Slug", bundle_zip("b1").as_slice())
        .unwrap_err();
    assert!(matches!(&err, PublishError::Validation(msg) if msg.contains("Not A Slug")));
}

struct FailingLatestWriter;

impl LatestWriter for FailingLatestWriter {
    fn write_latest(&self, _store: &DatasetStore, _pointer: &LatestPointer) -> Result<(), PublishError> {
        Err(PublishError::internal(
            "simulated latest failure",
            std::io::Error::other("boom"),
        ))
    }
}

#[test]
fn failed_pointer_write_rolls_back_bundle() {
    let root = tempdir().unwrap();
    let config = PublishConfig::new(root.path().join("data"), root.path().join("staging"));
    let publisher = Publisher::with_latest_writer(config.clone(), Box::new(FailingLatestWriter));

    let bundle = publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    let err = publisher.publish("ds1", bundle, Some("Title")).unwrap_err();
    assert!(matches!(err, PublishError::Internal { .. }));

    // No latest pointer, no bundle directory, no stray temp directory.
    assert!(publisher.store().read_latest("ds1").unwrap().is_none());
    assert!(!config.data_root.join("bundles/b1").exists());
    let leftovers: Vec<_> = std::fs::read_dir(config.data_root.join("bundles"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "bundles root should be empty: {leftovers:?}");
    assert!(staging_is_empty(&config));
}

#[test]
fn failed_pointer_write_preserves_previous_pointer() {
    let root = tempdir().unwrap();
    let config = PublishConfig::new(root.path().join("data"), root.path().join("staging"));

    let good = Publisher::new(config.clone());
    let bundle = good.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    good.publish("ds1", bundle, None).unwrap();

    let failing = Publisher::with_latest_writer(config.clone(), Box::new(FailingLatestWriter));
    let bundle = failing.stage("ds1", bundle_zip("b2").as_slice()).unwrap();
    failing.publish("ds1", bundle, None).unwrap_err();

    let latest = good.store().read_latest("ds1").unwrap().unwrap();
    assert_eq!(latest.bundle_id, "b1");
    assert!(!config.data_root.join("bundles/b2").exists());
}

#[test]
fn receipt_urls_are_absolute_with_base_url() {
    let h = harness(|c| c.base_url(Url::parse("https://depot.example.com/pub").unwrap()));
    let bundle = h.publisher.stage("ds1", bundle_zip("b1").as_slice()).unwrap();
    let receipt = h.publisher.publish("ds1", bundle, None).unwrap();

    assert_eq!(
        receipt.latest_url.unwrap().as_str(),
        "https://depot.example.com/pub/datasets/ds1/latest.json"
    );
    assert_eq!(
        receipt.manifest_url.as_ref().unwrap().as_str(),
        "https://depot.example.com/pub/bundles/b1/manifest.json"
    );

    let latest = h.publisher.store().read_latest("ds1").unwrap().unwrap();
    assert_eq!(
        latest.manifest_url,
        "https://depot.example.com/pub/bundles/b1/manifest.json"
    );
}

#[test]
fn upload_is_archived_to_cold_storage_when_configured() {
    let root = tempdir().unwrap();
    let archive_root = root.path().join("cold");
    let config = PublishConfig::new(root.path().join("data"), root.path().join("staging"))
        .archive_root(&archive_root);
    let publisher = Publisher::new(config);

    let zip_bytes = bundle_zip("b1");
    let bundle = publisher.stage("ds1", zip_bytes.as_slice()).unwrap();
    publisher.publish("ds1", bundle, None).unwrap();

    let archived = archive_root.join("ds1/b1.zip");
    assert!(archived.is_file());
    assert_eq!(std::fs::read(&archived).unwrap(), zip_bytes);
}

#[test]
fn listing_reflects_published_datasets() {
    let h = harness(|c| c);

    let bundle = h.publisher.stage("older", bundle_zip("b1").as_slice()).unwrap();
    h.publisher.publish("older", bundle, Some("Older")).unwrap();
    let bundle = h.publisher.stage("newer", bundle_zip("b2").as_slice()).unwrap();
    h.publisher.publish("newer", bundle, Some("Newer")).unwrap();

    let listed = h.publisher.store().list().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].dataset_id, "newer");
    assert_eq!(listed[0].latest_bundle_id.as_deref(), Some("b2"));
    assert_eq!(listed[1].dataset_id, "older");
    assert_eq!(listed[1].title, "Older");
}

fn _assert_send_sync<T: Send + Sync>(_: &T) {}

#[test]
fn publisher_is_shareable_across_threads() {
    let h = harness(|c| c);
    _assert_send_sync(&h.publisher);
}
