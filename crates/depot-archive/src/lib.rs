//! Staging-phase archive handling for the depot publisher.
//!
//! - `spool.rs` - Size-capped copy of an upload stream to a staging file
//! - `extract.rs` - Zip extraction with per-entry path confinement
//!
//! Both operations write only inside a caller-supplied staging directory;
//! cleanup of partial state is the caller's concern (normally handled by
//! dropping a [`depot_fs::StagingDir`]).

mod error;
mod extract;
mod spool;

pub use error::{Error, Result};
pub use extract::extract_zip;
pub use spool::spool_to_file;
