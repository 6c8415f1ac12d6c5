//! Live reload: output watching and the browser event stream.

mod debouncer;
mod manager;
mod sse;
pub(crate) mod watcher;

pub(crate) use debouncer::FsEvent;
pub(crate) use manager::LiveReloadManager;
pub(crate) use sse::sse_handler;
