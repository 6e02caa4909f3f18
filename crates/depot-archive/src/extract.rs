use std::fs::File;
use std::io;
use std::path::Path;

use depot_fs::{ensure_dir, resolve_under_root};

use crate::error::{Error, Result};

/// Extract a spooled zip archive into `unpack_root`, one entry at a time.
///
/// Every entry name is confined to the unpack root before anything is
/// written: blank names are skipped, names starting with a separator are
/// rejected as absolute-path attempts, and any name that resolves outside
/// the root (via `..` segments or otherwise) is rejected as traversal.
/// Returns the number of file entries written.
pub fn extract_zip(archive_path: &Path, unpack_root: &Path) -> Result<usize> {
    ensure_dir(unpack_root)?;

    let file = File::open(archive_path).map_err(|e| Error::Extract {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|_| Error::Corrupted)?;

    let mut extracted = 0usize;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|_| Error::Corrupted)?;

        // Backslash separators count as separators here, whatever the platform.
        let name = entry.name().replace('\\', "/");
        if name.trim().is_empty() {
            continue;
        }
        if name.starts_with('/') {
            return Err(Error::AbsoluteEntry { name });
        }

        let target = resolve_under_root(unpack_root, &name)
            .map_err(|_| Error::Traversal { name: name.clone() })?;

        if entry.is_dir() {
            ensure_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }

        let mut out = File::create(&target).map_err(|e| Error::Extract {
            path: target.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::Extract {
            path: target.clone(),
            source: e,
        })?;
        extracted += 1;
    }

    Ok(extracted)
}
