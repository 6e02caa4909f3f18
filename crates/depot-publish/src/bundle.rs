use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use depot_fs::StagingDir;
use serde::{Deserialize, Serialize};
use url::Url;

/// A staged bundle that passed validation.
///
/// Owns its staging directory: dropping the value removes the spooled
/// archive and the unpacked tree, whether the commit phase ran or not.
#[derive(Debug)]
pub struct ValidatedBundle {
    pub(crate) bundle_id: String,
    pub(crate) staging: StagingDir,
    pub(crate) bundle_dir: PathBuf,
    pub(crate) manifest_path: PathBuf,
    pub(crate) model_path: PathBuf,
    pub(crate) indexes_path: PathBuf,
    pub(crate) archive_path: PathBuf,
}

impl ValidatedBundle {
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// The staged directory holding the three validated documents.
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn indexes_path(&self) -> &Path {
        &self.indexes_path
    }

    /// The spooled upload archive, kept for optional cold storage.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub(crate) fn staging_path(&self) -> &Path {
        self.staging.path()
    }
}

/// Per-dataset metadata document (`dataset.json`).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDoc {
    pub dataset_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The latest pointer (`latest.json`) — the only document consumers should
/// trust to find a dataset's current bundle.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPointer {
    pub dataset_id: String,
    pub bundle_id: String,
    pub manifest_url: String,
    pub published_at: DateTime<Utc>,
}

/// One entry of the append-only release history (`releases.json`).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    pub bundle_id: String,
    pub published_at: DateTime<Utc>,
}

/// Defensive listing row for one dataset directory.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub dataset_id: String,
    pub title: String,
    pub latest_bundle_id: Option<String>,
    pub updated_at: Option<String>,
}

/// Returned to the caller after a successful publish.
#[derive(Clone, Debug)]
pub struct PublishReceipt {
    pub dataset_id: String,
    pub bundle_id: String,
    pub published_at: DateTime<Utc>,
    pub latest_url: Option<Url>,
    pub manifest_url: Option<Url>,
}
