//! Typed failures raised by the document mirror.
//!
//! Only [`crate::engine::RetrievalEngine`] turns these into text; everything
//! below it propagates them unchanged.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Clone or pull failed: remote unreachable, authentication rejected,
    /// local copy not fast-forwardable, or `git` missing.
    #[error("{message}")]
    Sync { message: String },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file is not valid UTF-8: {}", .0.display())]
    Decode(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MirrorError {
    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
