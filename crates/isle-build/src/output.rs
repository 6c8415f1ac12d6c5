//! Output directory writes and removals.
//!
//! All paths handled here are relative to the output directory. Paths that
//! would resolve outside it are refused. Removal prunes directories left
//! empty, but never the output directory itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use isle_cache::{is_contained, short_hash};

/// Length of output filename fingerprints.
const FINGERPRINT_LEN: usize = 8;

/// Fingerprint of emitted bytes used in production filenames.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    short_hash(bytes, FINGERPRINT_LEN)
}

/// `<stem>.<fingerprint>.<ext>` when hashed, `<stem>.<ext>` otherwise.
#[must_use]
pub fn asset_name(stem: &str, ext: &str, content: &[u8], hashed: bool) -> String {
    if hashed {
        format!("{stem}.{}.{ext}", fingerprint(content))
    } else {
        format!("{stem}.{ext}")
    }
}

/// Root-relative URL for an output path.
#[must_use]
pub fn rel_to_url(rel: &Path) -> String {
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

/// Output path for a root-relative URL.
#[must_use]
pub fn url_to_rel(url: &str) -> PathBuf {
    PathBuf::from(url.trim_start_matches('/'))
}

/// Writes into the output directory.
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn exists(&self, rel: &Path) -> bool {
        self.resolve(rel).is_ok_and(|path| path.is_file())
    }

    fn resolve(&self, rel: &Path) -> io::Result<PathBuf> {
        if is_contained(rel) {
            Ok(self.root.join(rel))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is outside the output directory", rel.display()),
            ))
        }
    }

    /// Write `content` at `rel`, creating parent directories.
    ///
    /// Returns `false` without touching the file when it already holds
    /// exactly `content`.
    pub fn write(&self, rel: &Path, content: &[u8]) -> io::Result<bool> {
        let path = self.resolve(rel)?;
        if fs::read(&path).is_ok_and(|existing| existing == content) {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        tracing::debug!(path = %rel.display(), bytes = content.len(), "Wrote output");
        Ok(true)
    }

    /// Remove the file at `rel` and prune empty parent directories.
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn remove(&self, rel: &Path) -> io::Result<bool> {
        let path = self.resolve(rel)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }
        tracing::debug!(path = %rel.display(), "Removed output");

        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails on non-empty directories, which ends the walk.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(true)
    }
}
