//! Filesystem primitives for the depot publisher.
//!
//! - `path.rs` - Lexical normalization and root confinement
//! - `write.rs` - Atomic write-temp-then-rename, directory helpers
//! - `staging.rs` - Drop-cleaned staging directories

mod error;
mod path;
mod staging;
mod write;

pub use error::{Error, Result};
pub use path::{normalize_path, resolve_under_root};
pub use staging::StagingDir;
pub use write::{
    atomic_write, atomic_write_json, ensure_dir, read_to_vec, remove_dir_all_quietly,
};
