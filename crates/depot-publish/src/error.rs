use std::error::Error as StdError;

/// Failure taxonomy of the publishing core.
///
/// `Validation`, `Conflict` and `TooLarge` are expected, caller-actionable
/// outcomes and carry their full detail. `Internal` wraps unexpected I/O
/// failures; the original cause is preserved as a source for diagnostics but
/// the display string stays generic.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("payload too large: {0}")]
    TooLarge(String),

    #[error("internal publishing error: {detail}")]
    Internal {
        detail: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl PublishError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict(detail.into())
    }

    pub fn too_large(detail: impl Into<String>) -> Self {
        Self::TooLarge(detail.into())
    }

    pub fn internal(
        detail: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Internal {
            detail: detail.into(),
            source: Some(source.into()),
        }
    }
}

impl From<depot_fs::Error> for PublishError {
    fn from(err: depot_fs::Error) -> Self {
        match err {
            depot_fs::Error::Traversal { .. } => Self::Validation(err.to_string()),
            other => Self::internal("filesystem operation failed", other),
        }
    }
}

impl From<depot_archive::Error> for PublishError {
    fn from(err: depot_archive::Error) -> Self {
        use depot_archive::Error;
        match err {
            Error::TooLarge { limit } => {
                Self::TooLarge(format!("archive payload exceeds {limit} bytes"))
            }
            Error::AbsoluteEntry { .. } | Error::Traversal { .. } | Error::Corrupted => {
                Self::Validation(err.to_string())
            }
            other => Self::internal("archive staging failed", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
