//! Development server
//!
//! Serves the destination root over HTTP and pushes live-reload events to
//! pages that load the client script.
//!
//! Routes:
//! - [`RELOAD_EVENTS_PATH`] - server-sent event stream of reload events
//! - [`RELOAD_SCRIPT_PATH`] - the client script injected into pages
//! - everything else - static files, `index.html` for directories

pub mod reload;

pub use reload::{LiveReload, ReloadEvent};

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;

/// Event stream endpoint.
pub const RELOAD_EVENTS_PATH: &str = "/__livereload";

/// Client script endpoint.
pub const RELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Tag injected before `</body>` in development pages.
pub const RELOAD_SCRIPT_TAG: &str = "<script src=\"/__livereload.js\"></script>";

const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__livereload");
  source.addEventListener("reload", function (e) {
    if (e.data === "styles") {
      var links = document.querySelectorAll('link[rel="stylesheet"]');
      for (var i = 0; i < links.length; i++) {
        var url = links[i].href.replace(/[?&]livereload=\d+/, "");
        links[i].href = url + (url.indexOf("?") < 0 ? "?" : "&") + "livereload=" + Date.now();
      }
    } else {
      window.location.reload();
    }
  });
})();
"#;

/// Error while running the development server
#[derive(Debug, Error)]
pub enum ServeError {
    /// The address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// The server stopped with an I/O error
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static file server with live reload.
#[derive(Debug, Clone)]
pub struct DevServer {
    root: PathBuf,
    host: String,
    port: u16,
    reload: LiveReload,
}

impl DevServer {
    /// Create a server for `root` on `host:port`.
    pub fn new(
        root: impl Into<PathBuf>,
        host: impl Into<String>,
        port: u16,
        reload: LiveReload,
    ) -> Self {
        Self { root: root.into(), host: host.into(), port, reload }
    }

    /// Bind and serve until the process is interrupted.
    pub async fn run(self) -> Result<(), ServeError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|source| ServeError::Bind { addr: addr.clone(), source })?;
        let local = listener.local_addr()?;

        println!("Serving {} at http://{}", self.root.display(), local);
        tracing::info!("dev server listening on {}", local);

        axum::serve(listener, router(&self.root, self.reload)).await?;
        Ok(())
    }
}

/// Build the server's routes.
pub fn router(root: &Path, reload: LiveReload) -> Router {
    Router::new()
        .route(RELOAD_EVENTS_PATH, get(reload_events))
        .route(RELOAD_SCRIPT_PATH, get(client_script))
        .with_state(reload)
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
}

async fn reload_events(
    State(reload): State<LiveReload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(reload.subscribe()).filter_map(|message| match message {
        Ok(event) => Some(Ok(Event::default().event("reload").data(event.as_str()))),
        // Lagged receivers just miss events
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], CLIENT_SCRIPT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn site() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("assets/css")).unwrap();
        fs::write(temp.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(temp.path().join("assets/css/main.css"), "a{color:red}").unwrap();
        temp
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, String) {
        let response =
            app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn test_serves_index_for_root() {
        let temp = site();
        let (status, body) = get_path(router(temp.path(), LiveReload::new()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_serves_nested_assets() {
        let temp = site();
        let (status, body) =
            get_path(router(temp.path(), LiveReload::new()), "/assets/css/main.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a{color:red}");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp = site();
        let (status, _) = get_path(router(temp.path(), LiveReload::new()), "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_client_script() {
        let temp = site();
        let (status, body) =
            get_path(router(temp.path(), LiveReload::new()), RELOAD_SCRIPT_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("EventSource(\"/__livereload\")"));
        assert!(body.contains("styles"));
    }

    #[tokio::test]
    async fn test_event_stream_subscribes() {
        let temp = site();
        let reload = LiveReload::new();
        let response = router(temp.path(), reload.clone())
            .oneshot(Request::builder().uri(RELOAD_EVENTS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(reload.client_count(), 1);
    }

    #[test]
    fn test_script_tag_points_at_route() {
        assert!(RELOAD_SCRIPT_TAG.contains(RELOAD_SCRIPT_PATH));
    }
}
