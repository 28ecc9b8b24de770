use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The socket could not be opened, or died underneath us.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The server said something we did not ask for. The session is unusable after this.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that reconnecting cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Load { .. } | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
