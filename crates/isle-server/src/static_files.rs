//! Static file serving from the output directory.
//!
//! Request paths are percent-decoded and normalized lexically; any path that
//! climbs above the root is refused with 403, as is any file whose canonical
//! location (after symlinks) lies outside the root. Directories redirect to
//! their `index.html`; a trailing slash serves it directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use percent_encoding::percent_decode_str;

use crate::state::AppState;

/// Default document for directory requests.
const INDEX_FILE: &str = "index.html";

/// Create router for static file serving.
pub(crate) fn static_router() -> Router<Arc<AppState>> {
    Router::new().fallback(serve_file)
}

async fn serve_file(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let method = req.method();
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let head = method == Method::HEAD;
    let request_path = req.uri().path();

    let Some(rel) = normalize_request_path(request_path) else {
        tracing::warn!(path = %request_path, "Rejected path outside output directory");
        return StatusCode::FORBIDDEN.into_response();
    };

    let mut target = state.root.join(&rel);
    match tokio::fs::metadata(&target).await {
        Ok(meta) if meta.is_dir() => {
            if !request_path.ends_with('/') {
                let location = format!("{}/{INDEX_FILE}", request_path.trim_end_matches('/'));
                return Redirect::permanent(&location).into_response();
            }
            target.push(INDEX_FILE);
        }
        Ok(_) => {}
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    }

    match tokio::fs::canonicalize(&target).await {
        Ok(canonical) if canonical.starts_with(&state.root) => {}
        Ok(_) => {
            tracing::warn!(path = %request_path, "Rejected symlink outside output directory");
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    }

    let mut content = match tokio::fs::read(&target).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %target.display(), error = %e, "Failed to read file");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let mime = mime_for(&target);
    if mime.starts_with("text/html")
        && let Some(snippet) = state.live_reload_snippet()
    {
        content = inject_snippet(&String::from_utf8_lossy(&content), &snippet).into_bytes();
    }

    let length = content.len().to_string();
    let body = if head { Body::empty() } else { Body::from(content) };
    (
        [
            (header::CONTENT_TYPE, mime.to_owned()),
            (header::CONTENT_LENGTH, length),
        ],
        body,
    )
        .into_response()
}

/// Decode and normalize a URL path into a path relative to the root.
///
/// Returns `None` when `..` segments would escape the root or the path
/// contains separators or bytes that have no business in a URL segment.
fn normalize_request_path(path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s if s.contains(['\\', '\0', ':']) => return None,
            s => segments.push(s),
        }
    }
    Some(segments.iter().collect())
}

/// Insert `snippet` before the last `</body>`, or append it.
fn inject_snippet(html: &str, snippet: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{snippet}{}", &html[..pos], &html[pos..]),
        None => format!("{html}{snippet}"),
    }
}

/// Content type by file extension.
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        "webmanifest" => "application/manifest+json",
        _ => "application/octet-stream",
    }
}
