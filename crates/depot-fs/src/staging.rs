use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::write::{ensure_dir, remove_dir_all_quietly};

/// A uniquely named directory under a staging root.
///
/// Each instance gets its own UUID-named directory, so concurrent uploads
/// never share staging state. The directory and everything inside it is
/// removed recursively when the value is dropped.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn create(staging_root: impl AsRef<Path>) -> Result<Self> {
        let path = staging_root
            .as_ref()
            .join(uuid::Uuid::new_v4().to_string());
        ensure_dir(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        remove_dir_all_quietly(&self.path);
    }
}
