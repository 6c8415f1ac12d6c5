//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::live_reload::LiveReloadManager;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Canonical output directory served as the site root.
    pub(crate) root: PathBuf,
    /// Live reload manager (if enabled).
    pub(crate) live_reload: Option<Arc<LiveReloadManager>>,
}

impl AppState {
    /// Client snippet injected into HTML responses, if live reload is on.
    pub(crate) fn live_reload_snippet(&self) -> Option<String> {
        self.live_reload.as_ref().map(|manager| {
            format!(
                "<script>new EventSource(\"{}\").addEventListener(\"reload\",()=>location.reload());</script>\n",
                manager.path()
            )
        })
    }
}
