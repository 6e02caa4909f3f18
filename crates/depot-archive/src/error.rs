use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("archive contains absolute path entry: '{name}'")]
    AbsoluteEntry { name: String },

    #[error("archive traversal entry rejected: '{name}'")]
    Traversal { name: String },

    #[error("archive is corrupted or not a zip file")]
    Corrupted,

    #[error("failed to extract '{path}': {source}")]
    Extract { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] depot_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
