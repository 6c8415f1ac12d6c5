//! Optimizer that pipes bundles through an external command.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use super::Optimizer;
use crate::error::OptimizeError;

/// Runs `argv` with the bundle on stdin and takes stdout as the result.
pub struct CommandOptimizer {
    argv: Vec<String>,
}

impl CommandOptimizer {
    /// Returns `None` for an empty argv.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    fn program(&self) -> &str {
        &self.argv[0]
    }
}

impl Optimizer for CommandOptimizer {
    fn optimize(&self, code: &str) -> Result<String, OptimizeError> {
        let spawn_error = |source| OptimizeError::Spawn {
            program: self.program().to_owned(),
            source,
        };

        let mut child = Command::new(self.program())
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from a separate thread so a large bundle cannot deadlock
        // against a full stdout pipe.
        let stdin = child.stdin.take();
        let input = code.to_owned();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A tool that exits early closes the pipe; its status tells us more.
                let _ = stdin.write_all(input.as_bytes());
            }
        });

        let output = child.wait_with_output().map_err(spawn_error)?;
        let _ = writer.join();

        if !output.status.success() {
            return Err(OptimizeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let optimized = String::from_utf8_lossy(&output.stdout).into_owned();
        if optimized.trim().is_empty() {
            return Err(OptimizeError::Empty);
        }
        Ok(optimized)
    }
}
