//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router and its single dispatch handler
//! - Serve the portal page and static misses
//! - Hand upgrade attempts to the WebSocket acceptor
//! - Apply node table reloads
//! - Stop accepting, close live sessions and drain on shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::response::html_response;
use crate::http::{portal, websocket};
use crate::lifecycle::Shutdown;
use crate::registry::{NodeRegistry, NodeTable};
use crate::session::{SessionContext, SessionTracker};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<SessionContext>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    ctx: Arc<SessionContext>,
    /// Present when the registry is the config-backed table and can be reloaded.
    table: Option<Arc<NodeTable>>,
}

impl HttpServer {
    /// Create a server whose registry is filled from `config.nodes`.
    pub fn new(config: ProxyConfig) -> Self {
        let table = Arc::new(NodeTable::new(
            config.upgrade.node_key_prefix.clone(),
            &config.nodes,
        ));
        tracing::info!(nodes = table.len(), "Node table loaded");

        let mut server = Self::with_registry(config, table.clone());
        server.table = Some(table);
        server
    }

    /// Create a server backed by an arbitrary registry.
    pub fn with_registry(config: ProxyConfig, registry: Arc<dyn NodeRegistry>) -> Self {
        let ctx = Arc::new(SessionContext::new(
            &config,
            registry,
            Arc::new(Shutdown::new()),
        ));
        let router = Self::build_router(AppState { ctx: ctx.clone() });
        Self {
            router,
            config,
            ctx,
            table: None,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Live session counter.
    pub fn sessions(&self) -> SessionTracker {
        self.ctx.tracker.clone()
    }

    /// Serve on `listener` until `signal` resolves.
    ///
    /// Config updates replace the node table as they arrive. After the signal,
    /// live sessions are told to close and given `drain_secs` to finish.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        signal: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        match self.table.clone() {
            Some(table) => {
                tokio::spawn(async move {
                    while let Some(config) = config_updates.recv().await {
                        table.replace(&config.nodes);
                        tracing::info!(nodes = table.len(), "Node table reloaded");
                    }
                });
            }
            None => tracing::debug!("Registry is not config-backed, ignoring reloads"),
        }

        let shutdown = self.ctx.shutdown.clone();
        let stop = async move {
            signal.await;
            shutdown.trigger();
            tracing::info!(listeners = shutdown.receiver_count(), "Shutdown triggered");
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(stop)
            .await?;

        let drain = Duration::from_secs(self.config.timeouts.drain_secs);
        let live = self.ctx.tracker.active_count();
        if live > 0 {
            tracing::info!(sessions = live, "Waiting for sessions to close");
        }
        if !self.ctx.tracker.wait_idle(drain).await {
            tracing::warn!(
                sessions = self.ctx.tracker.active_count(),
                "Sessions still open after drain deadline"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single entry point for every request.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if method != Method::GET {
        let error = ProxyError::Forbidden(method);
        tracing::debug!(path = uri.path(), error = %error, "Rejecting request");
        return error.into_response();
    }

    let host = match host_header(&headers) {
        Ok(host) => host,
        Err(error) => {
            tracing::debug!(path = uri.path(), error = %error, "Rejecting request");
            return error.into_response();
        }
    };

    match uri.path() {
        "/" => html_response(portal::render(host, state.ctx.resolver.prefix())),
        "/favicon.ico" => ProxyError::NotFoundStatic(uri.path().to_string()).into_response(),
        _ => websocket::accept(state.ctx, upgrade, &uri, host),
    }
}

fn host_header(headers: &HeaderMap) -> Result<&str, ProxyError> {
    headers
        .get(header::HOST)
        .ok_or_else(|| ProxyError::BadRequest("missing Host header".to_string()))?
        .to_str()
        .map_err(|_| ProxyError::BadRequest("Host header is not valid text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new(ProxyConfig::default())
    }

    async fn send(request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = server().router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header(header::HOST, "proxy.test:8080")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn root_serves_portal() {
        let (status, headers, body) = send(get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=UTF-8");
        assert_eq!(headers[header::CONTENT_LENGTH], body.len().to_string());
        assert!(body.contains("WSIN Portal"));
        assert!(body.contains("ws://proxy.test:8080/wsin/"));
    }

    #[tokio::test]
    async fn favicon_is_not_found() {
        let (status, headers, body) = send(get("/favicon.ico")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers[header::CONNECTION], "close");
        assert_eq!(body, "404 Not Found");
    }

    #[tokio::test]
    async fn non_get_is_forbidden_on_any_path() {
        for (method, path) in [
            (Method::POST, "/wsin/node1/chat/room1"),
            (Method::PUT, "/"),
            (Method::DELETE, "/favicon.ico"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(path)
                .header(header::HOST, "proxy.test")
                .body(Body::empty())
                .unwrap();
            let (status, _, body) = send(request).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body, "403 Forbidden");
        }
    }

    #[tokio::test]
    async fn missing_host_is_bad_request() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "400 Bad Request");
    }

    #[tokio::test]
    async fn plain_get_on_route_gets_library_rejection() {
        let (status, _, _) = send(get("/wsin/node1/chat/room1")).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let request = Request::builder()
            .uri("/wsin/node1/chat/room1")
            .header(header::HOST, "proxy.test")
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "8")
            .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(request).await;
        assert!(status.is_client_error());
    }
}
