//! Build-cache primitives for isle.
//!
//! This crate provides the three leaf components the incremental build relies on:
//!
//! - [`hash`] / [`hash_file`]: stable content digests (SHA-256, hex encoded)
//! - [`DependencySnapshot`]: file path to content hash map used as a staleness test
//! - [`CacheStore`]: the versioned JSON manifest persisted between builds
//!
//! # Example
//!
//! ```
//! use isle_cache::{BuildProfile, CacheStore, Mode};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = CacheStore::new(dir.path().join(".isle-cache.json"));
//! let profile = BuildProfile::new(Mode::Development, false, &[]);
//!
//! let cache = store.load(&profile);
//! assert!(cache.pages.is_empty());
//! store.save(&cache).unwrap();
//! ```

mod hash;
mod manifest;
mod snapshot;

pub use hash::{hash, hash_file, short_hash};
pub use manifest::{
    BuildCache, BuildProfile, CACHE_VERSION, CacheStore, IslandRecord, Mode, PageRecord,
    is_contained,
};
pub use snapshot::{DependencySnapshot, snapshots_equal};
