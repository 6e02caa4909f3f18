use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use depot_fs::StagingDir;
use serde::Deserialize;
use serde::de::IgnoredAny;
use walkdir::WalkDir;

use crate::bundle::ValidatedBundle;
use crate::config::PublishConfig;
use crate::error::{PublishError, Result};
use crate::policy;

const MANIFEST_NAME: &str = "manifest.json";
const MODEL_NAME: &str = "model.json";
const INDEXES_NAME: &str = "indexes.json";

/// Stage an uploaded archive: spool it under a byte cap, extract it with
/// traversal protection, and validate the bundle structure.
///
/// On any failure the whole staging directory is removed before the error
/// surfaces; no partial staging state is left behind.
pub fn stage_upload(
    config: &PublishConfig,
    dataset_id: &str,
    upload: impl Read,
) -> Result<ValidatedBundle> {
    policy::require_valid_dataset_id(dataset_id)?;

    // Dropping this on the error path below cleans up everything staged.
    let staging = StagingDir::create(&config.staging_root)?;
    let archive_path = staging.path().join("upload.zip");
    let unpack_root = staging.path().join("unpack");

    depot_archive::spool_to_file(upload, &archive_path, config.max_archive_bytes)?;
    depot_archive::extract_zip(&archive_path, &unpack_root)?;

    let manifest_path = locate_manifest(&unpack_root)?;
    let bundle_dir = manifest_path
        .parent()
        .ok_or_else(|| PublishError::validation("manifest has no parent directory"))?
        .to_path_buf();

    let model_path = bundle_dir.join(MODEL_NAME);
    let indexes_path = bundle_dir.join(INDEXES_NAME);
    for (path, name) in [(&model_path, MODEL_NAME), (&indexes_path, INDEXES_NAME)] {
        if !path.is_file() {
            return Err(PublishError::validation(format!(
                "archive is missing {name} next to {MANIFEST_NAME}"
            )));
        }
    }

    for path in [&manifest_path, &model_path, &indexes_path] {
        check_document(path, config.max_document_bytes)?;
    }

    let bundle_id = read_bundle_id(&manifest_path)?;

    // Cheaper to fail now than after another round of copying; the commit
    // phase re-checks under its own lock.
    if config.bundles_root().join(&bundle_id).exists() {
        return Err(PublishError::conflict(format!(
            "bundle already exists: {bundle_id}"
        )));
    }

    Ok(ValidatedBundle {
        bundle_id,
        staging,
        bundle_dir,
        manifest_path,
        model_path,
        indexes_path,
        archive_path,
    })
}

/// Find the single manifest anywhere under the unpack root.
fn locate_manifest(unpack_root: &Path) -> Result<PathBuf> {
    let mut manifests: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(unpack_root) {
        let entry = entry
            .map_err(|e| PublishError::internal("failed to walk unpacked archive", e))?;
        if entry.file_type().is_file() && entry.file_name() == MANIFEST_NAME {
            manifests.push(entry.into_path());
        }
    }

    match manifests.len() {
        0 => Err(PublishError::validation(format!(
            "archive is missing {MANIFEST_NAME}"
        ))),
        1 => Ok(manifests.remove(0)),
        _ => Err(PublishError::validation(format!(
            "archive contains multiple {MANIFEST_NAME} files; expected exactly one"
        ))),
    }
}

/// Size cap plus a streaming well-formedness check; the document is parsed
/// event by event, never materialized.
fn check_document(path: &Path, max_bytes: u64) -> Result<()> {
    let name = path.file_name().unwrap_or_default().to_string_lossy();

    let size = std::fs::metadata(path)
        .map_err(|e| PublishError::internal(format!("failed to stat {name}"), e))?
        .len();
    if size > max_bytes {
        return Err(PublishError::too_large(format!(
            "document too large: {name} ({size} bytes), max={max_bytes}"
        )));
    }

    let file = File::open(path)
        .map_err(|e| PublishError::internal(format!("failed to open {name}"), e))?;
    serde_json::from_reader::<_, IgnoredAny>(BufReader::new(file))
        .map_err(|e| PublishError::validation(format!("malformed JSON in {name}: {e}")))?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHead {
    #[serde(default)]
    bundle_id: String,
}

fn read_bundle_id(manifest_path: &Path) -> Result<String> {
    let file = File::open(manifest_path)
        .map_err(|e| PublishError::internal("failed to open manifest", e))?;
    let head: ManifestHead = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PublishError::validation(format!("malformed {MANIFEST_NAME}: {e}")))?;

    let bundle_id = head.bundle_id.trim().to_owned();
    if bundle_id.is_empty() {
        return Err(PublishError::validation(format!(
            "{MANIFEST_NAME} is missing bundleId"
        )));
    }
    if bundle_id.contains("..") || bundle_id.contains('/') || bundle_id.contains('\\') {
        return Err(PublishError::validation(format!(
            "invalid bundleId in {MANIFEST_NAME}: '{bundle_id}'"
        )));
    }

    Ok(bundle_id)
}
