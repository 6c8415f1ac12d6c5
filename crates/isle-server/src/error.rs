//! Server error types.

use std::io;
use std::path::PathBuf;

/// Errors that stop the development server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Host and port do not form a socket address.
    #[error("Invalid listen address {0}")]
    Address(String),

    /// Binding the listener failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A directory could not be watched.
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
