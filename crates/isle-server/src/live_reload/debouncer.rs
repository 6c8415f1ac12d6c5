//! Quiet-period batching of filesystem events.
//!
//! Editors and builds emit bursts of events. The batcher folds them per path
//! and releases the whole batch only once the burst has gone quiet for the
//! configured window, so one save (or one build) yields one batch.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Kind of filesystem event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FsEventKind {
    Created,
    Modified,
    Removed,
}

/// A coalesced filesystem event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

/// Collects events until a quiet period elapses.
///
/// Owned by a single debounce task; no locking.
pub(crate) struct EventBatcher {
    pending: BTreeMap<PathBuf, FsEventKind>,
    last_event: Option<Instant>,
    quiet: Duration,
}

impl EventBatcher {
    pub fn new(quiet: Duration) -> Self {
        Self {
            pending: BTreeMap::new(),
            last_event: None,
            quiet,
        }
    }

    /// Record an event observed at `now`. Restarts the quiet period.
    pub fn record(&mut self, path: PathBuf, kind: FsEventKind, now: Instant) {
        use std::collections::btree_map::Entry;

        self.last_event = Some(now);
        match self.pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(kind);
            }
            Entry::Occupied(mut entry) => match Self::coalesce(*entry.get(), kind) {
                Some(kind) => {
                    entry.insert(kind);
                }
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Merge two kinds for the same path. `None` drops the path.
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: FsEventKind, new: FsEventKind) -> Option<FsEventKind> {
        use FsEventKind::{Created, Modified, Removed};

        match (existing, new) {
            (Created, Created | Modified) => Some(Created),
            // Appeared and vanished inside one burst.
            (Created, Removed) => None,

            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified, Removed) => Some(Removed),

            // Replaced (write-temp-then-rename saves).
            (Removed, Created) => Some(Modified),
            (Removed, Modified | Removed) => Some(Removed),
        }
    }

    /// When the current burst goes quiet, if anything is pending.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_event.map(|last| last + self.quiet)
    }

    /// Take the batch if the quiet period has elapsed at `now`.
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<FsEvent>> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_event = None;
        let batch = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, kind)| FsEvent { path, kind })
            .collect();
        Some(batch)
    }
}
