//! Dependency snapshots.
//!
//! A [`DependencySnapshot`] maps absolute file paths to their content digest
//! (`None` when the file could not be read). Two snapshots are equal iff they
//! have the same key set and every digest matches, which is exactly what
//! `BTreeMap` equality gives us. A removed dependency therefore never compares
//! equal to the snapshot that still listed it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::hash::hash_file;

/// Path to content-hash map for one build unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySnapshot(BTreeMap<PathBuf, Option<String>>);

impl DependencySnapshot {
    /// Hash every path independently. Iteration order of `paths` does not
    /// affect the result; duplicates collapse.
    pub fn compute<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let unique: BTreeSet<PathBuf> = paths.into_iter().map(Into::into).collect();
        let entries = unique
            .into_par_iter()
            .map(|path| {
                let digest = hash_file(&path);
                (path, digest)
            })
            .collect();
        Self(entries)
    }

    /// Re-hash this snapshot's own key set from the filesystem and compare.
    #[must_use]
    pub fn is_current(&self) -> bool {
        Self::compute(self.0.keys().cloned()) == *self
    }

    /// Record a path that is known to be unresolvable right now.
    ///
    /// The entry hashes to `None`, so the snapshot goes stale as soon as a
    /// file appears at `path`.
    pub fn insert_missing(&mut self, path: PathBuf) {
        self.0.entry(path).or_insert(None);
    }

    /// Digest recorded for `path`, if the path is part of the snapshot.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Option<&str>> {
        self.0.get(path).map(Option::as_deref)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.0.keys().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(PathBuf, Option<String>)> for DependencySnapshot {
    fn from_iter<T: IntoIterator<Item = (PathBuf, Option<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Value comparison of two snapshots.
#[must_use]
pub fn snapshots_equal(a: &DependencySnapshot, b: &DependencySnapshot) -> bool {
    a == b
}
