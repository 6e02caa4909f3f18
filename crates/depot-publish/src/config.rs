use std::path::{Path, PathBuf};

use url::Url;

pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Plain configuration values consumed by the publishing core.
///
/// Loading these from the environment or a config file is the embedding
/// application's concern; the core only ever sees the resolved values.
#[derive(Clone, Debug)]
pub struct PublishConfig {
    pub data_root: PathBuf,
    pub staging_root: PathBuf,
    pub archive_root: Option<PathBuf>,
    pub max_archive_bytes: u64,
    pub max_document_bytes: u64,
    pub base_url: Option<Url>,
}

impl PublishConfig {
    pub fn new(data_root: impl AsRef<Path>, staging_root: impl AsRef<Path>) -> Self {
        Self {
            data_root: depot_fs::normalize_path(data_root.as_ref()),
            staging_root: depot_fs::normalize_path(staging_root.as_ref()),
            archive_root: None,
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            base_url: None,
        }
    }

    pub fn archive_root(mut self, root: impl AsRef<Path>) -> Self {
        self.archive_root = Some(depot_fs::normalize_path(root.as_ref()));
        self
    }

    pub fn max_archive_bytes(mut self, max: u64) -> Self {
        self.max_archive_bytes = max;
        self
    }

    pub fn max_document_bytes(mut self, max: u64) -> Self {
        self.max_document_bytes = max;
        self
    }

    pub fn base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    pub(crate) fn bundles_root(&self) -> PathBuf {
        self.data_root.join("bundles")
    }
}
