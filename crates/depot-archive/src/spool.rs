use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

const SPOOL_CHUNK: usize = 8 * 1024;

/// Copy `reader` to `dest`, aborting as soon as the running total exceeds
/// `max_bytes`.
///
/// The cap is checked per chunk, so an oversized upload fails fast without
/// the whole payload ever being buffered or written. The partially spooled
/// file is left behind for the staging directory's cleanup.
pub fn spool_to_file(mut reader: impl Read, dest: &Path, max_bytes: u64) -> Result<u64> {
    let mut out = File::create(dest).map_err(|e| Error::Extract {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut buf = [0u8; SPOOL_CHUNK];
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        if total > max_bytes {
            return Err(Error::TooLarge { limit: max_bytes });
        }
        out.write_all(&buf[..read]).map_err(|e| Error::Extract {
            path: dest.to_path_buf(),
            source: e,
        })?;
    }

    Ok(total)
}
