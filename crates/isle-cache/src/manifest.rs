//! Persisted build manifest.
//!
//! [`CacheStore`] keeps the last-known [`DependencySnapshot`] and output
//! locations for every page and island in a single JSON file:
//!
//! ```json
//! {
//!     "version": 1,
//!     "mode": "production",
//!     "purge": true,
//!     "classKeepHash": "e3b0c442...",
//!     "pages": { "src/pages/index.tsx": { "depHashes": {}, "islandSources": [], "htmlPath": "index.html" } },
//!     "islands": { "./counter.ts": { "srcPath": "/p/src/counter.ts", "depHashes": {}, "jsPath": "/islands/counter.js" } }
//! }
//! ```
//!
//! A manifest whose `(version, mode, purge, classKeepHash)` tuple differs from
//! the current [`BuildProfile`] is discarded wholesale: those parameters affect
//! the bytes of every output, so no memoized decision survives a change.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hash::hash;
use crate::snapshot::DependencySnapshot;

/// Manifest format version. Bump on any incompatible change.
pub const CACHE_VERSION: u32 = 1;

/// Whether `rel` names a location strictly inside the directory it is
/// joined onto: non-empty, relative, and free of `..` and `.` components.
#[must_use]
pub fn is_contained(rel: &Path) -> bool {
    let mut components = rel.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

fn url_is_contained(url: &str) -> bool {
    url.strip_prefix('/')
        .is_some_and(|rel| is_contained(Path::new(rel)))
}

/// Build mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Production,
    Development,
}

impl Mode {
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

/// Global build parameters that invalidate the whole cache when they change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildProfile {
    pub mode: Mode,
    pub purge: bool,
    /// Digest of the CSS purge allow-list.
    pub class_keep_hash: String,
}

impl BuildProfile {
    /// Create a profile, hashing the allow-list independent of order and duplicates.
    #[must_use]
    pub fn new(mode: Mode, purge: bool, keep: &[String]) -> Self {
        let mut sorted: Vec<&str> = keep.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        Self {
            mode,
            purge,
            class_keep_hash: hash(sorted.join("\n").as_bytes()),
        }
    }
}

/// Last successful build of one page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub dep_hashes: DependencySnapshot,
    /// Island sources referenced by the page, in first-reference order.
    pub island_sources: Vec<String>,
    /// HTML output, relative to the output directory.
    pub html_path: PathBuf,
    /// CSS output, relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_path: Option<PathBuf>,
}

/// Last successful build of one island source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandRecord {
    /// Resolved source file.
    pub src_path: PathBuf,
    pub dep_hashes: DependencySnapshot,
    /// Public URL of the compiled bundle (e.g. `/islands/counter.1a2b3c4d.js`).
    pub js_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_path: Option<String>,
}

/// The persisted manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCache {
    pub version: u32,
    pub mode: Mode,
    pub purge: bool,
    pub class_keep_hash: String,
    /// Keyed by page source path relative to the project root.
    #[serde(default)]
    pub pages: BTreeMap<String, PageRecord>,
    /// Keyed by island source string.
    #[serde(default)]
    pub islands: BTreeMap<String, IslandRecord>,
}

impl BuildCache {
    /// Create an empty cache tagged with `profile`.
    #[must_use]
    pub fn empty(profile: &BuildProfile) -> Self {
        Self {
            version: CACHE_VERSION,
            mode: profile.mode,
            purge: profile.purge,
            class_keep_hash: profile.class_keep_hash.clone(),
            pages: BTreeMap::new(),
            islands: BTreeMap::new(),
        }
    }

    /// Whether this cache was produced under `profile` by the current format.
    #[must_use]
    pub fn matches(&self, profile: &BuildProfile) -> bool {
        self.version == CACHE_VERSION
            && self.mode == profile.mode
            && self.purge == profile.purge
            && self.class_keep_hash == profile.class_keep_hash
    }

    /// Island sources referenced by a page that have no island record.
    pub fn dangling_island_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pages.iter().flat_map(move |(page, record)| {
            record
                .island_sources
                .iter()
                .filter(|src| !self.islands.contains_key(src.as_str()))
                .map(move |src| (page.as_str(), src.as_str()))
        })
    }

    /// Drop records whose outputs would resolve outside the output directory.
    ///
    /// Returns the number of records dropped.
    fn retain_contained_outputs(&mut self) -> usize {
        let before = self.pages.len() + self.islands.len();
        self.pages.retain(|_, page| {
            is_contained(&page.html_path) && page.css_path.as_deref().is_none_or(is_contained)
        });
        self.islands.retain(|_, island| {
            url_is_contained(&island.js_path)
                && island.css_path.as_deref().is_none_or(url_is_contained)
        });
        before - self.pages.len() - self.islands.len()
    }
}

/// File-backed manifest store.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest for `profile`.
    ///
    /// Returns a fresh empty cache if the file is absent, unreadable, malformed,
    /// or was written under a different profile. Never fails.
    #[must_use]
    pub fn load(&self, profile: &BuildProfile) -> BuildCache {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No build cache found, starting fresh");
                return BuildCache::empty(profile);
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read build cache");
                return BuildCache::empty(profile);
            }
        };

        match serde_json::from_str::<BuildCache>(&content) {
            Ok(mut cache) if cache.matches(profile) => {
                let dropped = cache.retain_contained_outputs();
                if dropped > 0 {
                    tracing::warn!(
                        dropped,
                        "Dropped build cache records pointing outside the output directory"
                    );
                }
                tracing::debug!(
                    pages = cache.pages.len(),
                    islands = cache.islands.len(),
                    "Loaded build cache"
                );
                cache
            }
            Ok(cache) => {
                tracing::info!(
                    stored_version = cache.version,
                    stored_mode = cache.mode.as_str(),
                    stored_purge = cache.purge,
                    "Build cache profile mismatch, discarding"
                );
                BuildCache::empty(profile)
            }
            Err(e) => {
                tracing::info!(error = %e, "Build cache unreadable, discarding");
                BuildCache::empty(profile)
            }
        }
    }

    /// Persist the manifest.
    ///
    /// The JSON is written to a sibling temp file and renamed into place, so
    /// readers see either the previous manifest or the complete new one.
    pub fn save(&self, cache: &BuildCache) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(cache).map_err(io::Error::other)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Saved build cache");
        Ok(())
    }

    /// Remove the manifest file if present.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
