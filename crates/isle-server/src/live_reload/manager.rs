//! Live reload manager.
//!
//! Watches the output directory and broadcasts a reload to every connected
//! browser once a burst of writes has settled.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

use super::watcher::{BatchWatcher, watch_batches};
use crate::error::ServerError;

/// Broadcast to clients after output files change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReloadEvent {
    /// Number of output paths in the batch.
    pub changed: usize,
}

/// Pending reload events per slow client before it starts lagging.
const CHANNEL_CAPACITY: usize = 16;

/// Tracks connected clients and fans reload events out to them.
pub(crate) struct LiveReloadManager {
    path: String,
    broadcaster: broadcast::Sender<ReloadEvent>,
    clients: Mutex<HashSet<Uuid>>,
    watcher: Mutex<Option<BatchWatcher>>,
}

impl LiveReloadManager {
    /// Create a manager serving its event stream at `path`.
    pub(crate) fn new(path: String) -> Self {
        let (broadcaster, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            path,
            broadcaster,
            clients: Mutex::new(HashSet::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Endpoint path of the event stream.
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Start watching `out_dir`.
    ///
    /// Each debounced batch of changes becomes one reload broadcast.
    pub(crate) fn start(
        self: &Arc<Self>,
        out_dir: PathBuf,
        debounce: Duration,
    ) -> Result<(), ServerError> {
        let (watcher, mut batches) = watch_batches(&[out_dir], Vec::new(), debounce)?;
        *lock(&self.watcher) = Some(watcher);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                manager.reload(batch.len());
            }
        });
        Ok(())
    }

    /// Broadcast a reload to all connected clients.
    pub(crate) fn reload(&self, changed: usize) {
        // No receivers is not an error: nobody is looking.
        let _ = self.broadcaster.send(ReloadEvent { changed });
        tracing::info!(changed, clients = self.client_count(), "Live reload triggered");
    }

    /// Register a client. It stays registered until the guard is dropped.
    pub(crate) fn connect(self: &Arc<Self>) -> ClientGuard {
        let id = Uuid::new_v4();
        let count = {
            let mut clients = lock(&self.clients);
            clients.insert(id);
            clients.len()
        };
        tracing::info!(client = %id, clients = count, "Live reload client connected");
        ClientGuard {
            id,
            manager: Arc::clone(self),
        }
    }

    fn disconnect(&self, id: Uuid) {
        let count = {
            let mut clients = lock(&self.clients);
            clients.remove(&id);
            clients.len()
        };
        tracing::info!(client = %id, clients = count, "Live reload client disconnected");
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.broadcaster.subscribe()
    }

    pub(crate) fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }
}

/// Keeps a client registered while its stream is alive.
pub(crate) struct ClientGuard {
    id: Uuid,
    manager: Arc<LiveReloadManager>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.manager.disconnect(self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
