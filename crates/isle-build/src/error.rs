//! Error types for the build pipeline.
//!
//! Only [`BuildError`] aborts a build. The unit-level errors are caught at
//! the orchestrator boundary and turned into log lines.

use std::io;
use std::path::PathBuf;

/// Fatal build failure. No manifest is written when a build returns one.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No pages found in {}", .0.display())]
    NoPages(PathBuf),

    #[error("Failed to write build cache: {0}")]
    Cache(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error returned by a [`Compiler`](crate::Compiler) backend.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Compiling {} failed:\n{stderr}", entry.display())]
    Failed { entry: PathBuf, stderr: String },

    #[error("Invalid bundler metafile: {0}")]
    Metafile(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error returned by a [`PageRuntime`](crate::PageRuntime) backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The page module does not export a render function.
    #[error("Page module has no default export")]
    NoDefaultExport,

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Render failed:\n{stderr}")]
    Failed { stderr: String },

    #[error("Invalid render output: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error returned by an [`Optimizer`](crate::Optimizer) backend.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Optimizer exited with {status}:\n{stderr}")]
    Failed { status: String, stderr: String },

    #[error("Optimizer produced no output")]
    Empty,
}

/// CSS that could not be parsed for purging.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CssError {
    #[error("Unclosed block starting at byte {0}")]
    Unclosed(usize),

    #[error("Unexpected '}}' at byte {0}")]
    UnexpectedClose(usize),

    #[error("Unterminated {what} starting at byte {at}")]
    Unterminated { what: &'static str, at: usize },
}

/// Failure of a single page or island. Logged, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
