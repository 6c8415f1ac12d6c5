//! CLI error types.

use isle_build::BuildError;
use isle_config::ConfigError;
use isle_server::ServerError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("Build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
