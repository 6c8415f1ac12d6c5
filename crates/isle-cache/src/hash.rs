//! Content hashing.
//!
//! Digests are lowercase hex SHA-256, so they are identical across processes
//! and platforms for identical bytes. The same digest feeds both dependency
//! snapshots and output filename fingerprints.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute the digest of a byte slice.
#[must_use]
pub fn hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compute the digest of a file's contents.
///
/// Returns `None` if the file is missing or unreadable. Never fails.
#[must_use]
pub fn hash_file(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(hash(&bytes)),
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "Unreadable dependency");
            None
        }
    }
}

/// Truncated digest used in output filenames (e.g. `about.1a2b3c4d.css`).
#[must_use]
pub fn short_hash(bytes: &[u8], len: usize) -> String {
    let mut digest = hash(bytes);
    digest.truncate(len);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(
            hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hash_differs_for_different_bytes() {
        assert_ne!(hash(b"a"), hash(b"b"));
    }

    #[test]
    fn test_hash_file_matches_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.tsx");
        fs::write(&path, b"export default 1").unwrap();

        assert_eq!(hash_file(&path), Some(hash(b"export default 1")));
    }

    #[test]
    fn test_hash_file_missing_returns_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(hash_file(&tmp.path().join("missing.ts")), None);
    }

    #[test]
    fn test_short_hash_truncates() {
        let short = short_hash(b"hello", 8);
        assert_eq!(short, "2cf24dba");
    }
}
