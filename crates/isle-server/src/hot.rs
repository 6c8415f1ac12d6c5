//! Hot rebuilds.
//!
//! Source changes arrive as debounced batches. Each batch asks the
//! [`BuildGate`] for a build: when idle a worker task starts, when a build is
//! already running the request is folded into a single queued re-run. Builds
//! never overlap and are never cancelled mid-way.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use isle_build::SiteBuilder;

use crate::error::ServerError;
use crate::live_reload::FsEvent;
use crate::live_reload::watcher::{BatchWatcher, watch_batches};

/// Outcome of asking the gate for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// No build was running; the caller must run one.
    Started,
    /// A build is running; one more run will follow it.
    Queued,
}

#[derive(Debug, Default)]
struct GateState {
    building: bool,
    queued: bool,
}

/// Mutual exclusion between builds with a single pending re-run.
#[derive(Debug, Default)]
pub(crate) struct BuildGate {
    state: Mutex<GateState>,
}

impl BuildGate {
    pub(crate) fn request(&self) -> Trigger {
        let mut state = self.lock();
        if state.building {
            state.queued = true;
            Trigger::Queued
        } else {
            state.building = true;
            Trigger::Started
        }
    }

    /// Mark the running build finished.
    ///
    /// Returns `true` when a re-run was queued; the gate then stays closed and
    /// the caller must build again.
    pub(crate) fn finish(&self) -> bool {
        let mut state = self.lock();
        if state.queued {
            state.queued = false;
            true
        } else {
            state.building = false;
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the hot watcher observes.
#[derive(Debug, Clone)]
pub(crate) struct HotSettings {
    pub source_dir: PathBuf,
    /// Watched separately when it lies outside `source_dir`.
    pub pages_dir: PathBuf,
    /// Dependency packages; only those present on disk are watched.
    pub watch_packages: Vec<PathBuf>,
    /// Build outputs, never treated as source changes.
    pub ignored: Vec<PathBuf>,
    pub debounce: Duration,
}

/// Directories whose changes trigger a rebuild.
fn watch_roots(settings: &HotSettings) -> Vec<PathBuf> {
    let mut roots = vec![settings.source_dir.clone()];
    if !settings.pages_dir.starts_with(&settings.source_dir) {
        roots.push(settings.pages_dir.clone());
    }
    roots.extend(
        settings
            .watch_packages
            .iter()
            .filter(|path| path.is_dir())
            .cloned(),
    );
    roots
}

/// Start watching sources and rebuilding through `builder`.
pub(crate) fn start(
    builder: Arc<SiteBuilder>,
    settings: &HotSettings,
) -> Result<BatchWatcher, ServerError> {
    let roots = watch_roots(settings);
    let (watcher, mut batches) =
        watch_batches(&roots, settings.ignored.clone(), settings.debounce)?;
    tracing::info!(roots = roots.len(), "Hot rebuild enabled");

    let gate = Arc::new(BuildGate::default());
    tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            log_batch(&batch);
            match gate.request() {
                Trigger::Started => {
                    tokio::spawn(run_builds(Arc::clone(&builder), Arc::clone(&gate)));
                }
                Trigger::Queued => tracing::debug!("Build in progress, rebuild queued"),
            }
        }
    });

    Ok(watcher)
}

fn log_batch(batch: &[FsEvent]) {
    match batch {
        [event] => {
            tracing::info!(path = %event.path.display(), kind = ?event.kind, "Source changed");
        }
        _ => tracing::info!(changed = batch.len(), "Sources changed"),
    }
}

/// Build until the gate reports no queued re-run.
///
/// The caller must hold the gate (a `Started` trigger).
async fn run_builds(builder: Arc<SiteBuilder>, gate: Arc<BuildGate>) {
    loop {
        let worker = Arc::clone(&builder);
        match tokio::task::spawn_blocking(move || worker.build()).await {
            Ok(Ok(report)) => tracing::info!(
                pages_built = report.pages_built,
                pages_reused = report.pages_reused,
                islands_built = report.islands_built,
                files_removed = report.files_removed,
                elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
                "Rebuild finished"
            ),
            Ok(Err(e)) => tracing::error!(error = %e, "Rebuild failed"),
            Err(e) => tracing::error!(error = %e, "Rebuild task aborted"),
        }

        if !gate.finish() {
            break;
        }
        tracing::debug!("Running queued rebuild");
    }
}
