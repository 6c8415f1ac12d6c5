//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload;
use crate::middleware::headers;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    // Event stream for live reload
    if let Some(manager) = &state.live_reload {
        router = router.route(manager.path(), get(live_reload::sse_handler));
    }

    router
        .merge(static_files::static_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(headers::content_type_options_layer())
                .layer(headers::cache_control_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_reload::LiveReloadManager;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use futures_util::StreamExt;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const RELOAD_PATH: &str = "/__isle/reload";

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let write = |rel: &str, content: &str| {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        };
        write("index.html", "<html><body><h1>Home</h1></body></html>");
        write("about/index.html", "<html><body>About</body></html>");
        write("index.1a2b3c4d.css", ".a{color:red}");
        write("islands/counter.js", "console.log(1)");
        dir
    }

    fn state(root: &Path, live_reload: bool) -> Arc<AppState> {
        Arc::new(AppState {
            root: root.canonicalize().unwrap(),
            live_reload: live_reload
                .then(|| Arc::new(LiveReloadManager::new(RELOAD_PATH.to_owned()))),
        })
    }

    async fn send(router: Router, method: Method, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_serves_index_with_headers() {
        let dir = site();
        let router = create_router(state(dir.path(), false));

        let response = send(router, Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            body_text(response).await,
            "<html><body><h1>Home</h1></body></html>"
        );
    }

    #[tokio::test]
    async fn test_assets_get_mime_types() {
        let dir = site();
        let state = state(dir.path(), false);

        let css = send(create_router(Arc::clone(&state)), Method::GET, "/index.1a2b3c4d.css").await;
        assert_eq!(css.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");

        let js = send(create_router(state), Method::GET, "/islands/counter.js").await;
        assert_eq!(
            js.headers()[header::CONTENT_TYPE],
            "text/javascript; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_directory_redirects_to_index() {
        let dir = site();
        let state = state(dir.path(), false);

        let response = send(create_router(Arc::clone(&state)), Method::GET, "/about").await;
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/about/index.html");

        let response = send(create_router(state), Method::GET, "/about/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<html><body>About</body></html>");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = site();
        let response = send(create_router(state(dir.path(), false)), Method::GET, "/nope.html").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let dir = site();
        let response = send(
            create_router(state(dir.path(), false)),
            Method::GET,
            "/%2e%2e/%2e%2e/etc/passwd",
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_outside_root_is_forbidden() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let dir = site();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("leak.txt"),
        )
        .unwrap();

        let response = send(create_router(state(dir.path(), false)), Method::GET, "/leak.txt").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_head_matches_get_without_body() {
        let dir = site();
        let response = send(create_router(state(dir.path(), false)), Method::HEAD, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "39");
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        let dir = site();
        let response = send(create_router(state(dir.path(), false)), Method::POST, "/").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_live_reload_snippet_injected_into_html_only() {
        let dir = site();
        let state = state(dir.path(), true);

        let html = send(create_router(Arc::clone(&state)), Method::GET, "/").await;
        let text = body_text(html).await;
        assert!(text.contains("new EventSource(\"/__isle/reload\")"));
        assert!(text.find("EventSource").unwrap() < text.find("</body>").unwrap());

        let css = send(create_router(state), Method::GET, "/index.1a2b3c4d.css").await;
        assert_eq!(body_text(css).await, ".a{color:red}");

        // Output on disk stays untouched.
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<html><body><h1>Home</h1></body></html>"
        );
    }

    #[tokio::test]
    async fn test_reload_endpoint_absent_when_disabled() {
        let dir = site();
        let response = send(create_router(state(dir.path(), false)), Method::GET, RELOAD_PATH).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_stream_delivers_reload() {
        let dir = site();
        let state = state(dir.path(), true);
        let manager = Arc::clone(state.live_reload.as_ref().unwrap());

        let response = send(create_router(state), Method::GET, RELOAD_PATH).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(manager.client_count(), 1);

        manager.reload(2);
        let mut frames = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();
        assert!(frame.contains("event: reload"));
        assert!(frame.contains("data: 2"));

        drop(frames);
        assert_eq!(manager.client_count(), 0);
    }
}
