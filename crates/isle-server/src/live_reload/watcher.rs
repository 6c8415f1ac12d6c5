//! Filesystem watching with debounced batches.
//!
//! The notify callback forwards raw events into a channel; a debounce task
//! folds them through an [`EventBatcher`] and emits one batch per quiet
//! period on the returned receiver.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::debouncer::{EventBatcher, FsEvent, FsEventKind};
use crate::error::ServerError;

/// Raw events buffered between the notify thread and the debounce task.
const RAW_EVENT_BUFFER: usize = 256;

/// A running watcher. Watching stops when this is dropped.
pub(crate) struct BatchWatcher {
    _watcher: RecommendedWatcher,
}

/// Watch `roots` recursively and deliver debounced event batches.
///
/// Paths under any of `ignored` are dropped before debouncing.
pub(crate) fn watch_batches(
    roots: &[PathBuf],
    ignored: Vec<PathBuf>,
    quiet: Duration,
) -> Result<(BatchWatcher, mpsc::Receiver<Vec<FsEvent>>), ServerError> {
    let (raw_tx, raw_rx) = mpsc::channel::<Event>(RAW_EVENT_BUFFER);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            // The callback runs on notify's own thread.
            Ok(event) => {
                let _ = raw_tx.blocking_send(event);
            }
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        }
    })
    .map_err(|source| ServerError::Watch {
        path: roots.first().cloned().unwrap_or_default(),
        source,
    })?;

    for root in roots {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| ServerError::Watch {
                path: root.clone(),
                source,
            })?;
        tracing::debug!(path = %root.display(), "Watching directory");
    }

    let (batch_tx, batch_rx) = mpsc::channel(8);
    tokio::spawn(debounce(raw_rx, batch_tx, ignored, quiet));

    Ok((BatchWatcher { _watcher: watcher }, batch_rx))
}

/// Fold raw events into batches until either channel closes.
async fn debounce(
    mut events: mpsc::Receiver<Event>,
    batches: mpsc::Sender<Vec<FsEvent>>,
    ignored: Vec<PathBuf>,
    quiet: Duration,
) {
    let mut batcher = EventBatcher::new(quiet);

    loop {
        let event = match batcher.deadline() {
            Some(deadline) => {
                tokio::select! {
                    event = events.recv() => event,
                    () = tokio::time::sleep_until(deadline.into()) => {
                        if let Some(batch) = batcher.take_ready(Instant::now())
                            && batches.send(batch).await.is_err()
                        {
                            return;
                        }
                        continue;
                    }
                }
            }
            None => events.recv().await,
        };

        let Some(event) = event else {
            return;
        };
        record_event(&mut batcher, &event, &ignored);
    }
}

fn record_event(batcher: &mut EventBatcher, event: &Event, ignored: &[PathBuf]) {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Created,
        EventKind::Modify(_) => FsEventKind::Modified,
        EventKind::Remove(_) => FsEventKind::Removed,
        _ => return,
    };

    let now = Instant::now();
    for path in &event.paths {
        if is_ignored(path, ignored) {
            continue;
        }
        tracing::trace!(path = %path.display(), ?kind, "Recorded filesystem event");
        batcher.record(path.clone(), kind, now);
    }
}

fn is_ignored(path: &Path, ignored: &[PathBuf]) -> bool {
    ignored.iter().any(|prefix| path.starts_with(prefix))
}
