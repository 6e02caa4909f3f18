use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

/// Create a directory and all of its parents.
pub fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Atomically replace `path` with `content`.
///
/// Writes to a uniquely named temp file in the same directory, then renames
/// over the target. The rename replaces an existing file; on filesystems
/// without atomic rename the replace is best-effort, not atomic.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| Error::Write {
        path: path.to_path_buf(),
        source: io::Error::other("target has no parent directory"),
    })?;
    ensure_dir(parent)?;

    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let tmp_path = parent.join(format!(".{}.tmp.{}", file_name, uuid::Uuid::new_v4()));

    fs::write(&tmp_path, content).map_err(|e| Error::Write {
        path: tmp_path.clone(),
        source: e,
    })?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Write {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Serialize `value` as JSON and atomically replace `path` with it.
pub fn atomic_write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: io::Error::other(e),
    })?;
    atomic_write(path, &bytes)
}

pub fn read_to_vec(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Recursively delete a directory, swallowing every failure.
pub fn remove_dir_all_quietly(dir: impl AsRef<Path>) {
    let _ = fs::remove_dir_all(dir.as_ref());
}
