//! Application server: handler registration and request dispatch.
//!
//! # Responsibilities
//! - Own the handler registry (no process-wide state)
//! - Enforce the Configuring → Serving lifecycle
//! - Bind the listener and serve through Axum
//! - Run the per-request pipeline: read body, build extractor, call handler, write response
//!
//! # Dispatch Pipeline
//! ```text
//! request
//!     → registry lookup            (none → 404)
//!     → read full body             (error / over limit → 500)
//!     → build extractor            (never fails; form problems go to query getters)
//!     → handler on blocking pool   (Err / panic → 500)
//!     → serialize body             (error → 500)
//!     → status (0 → 200), Content-Type ("" → application/json), body
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::error::{HandlerError, ServerError};
use crate::http::extractor::{DefaultRequestExtractor, RequestExtractor};
use crate::http::request::Request;
use crate::http::response::{internal_server_error, not_found, Response};
use crate::lifecycle::{stop_signal, Shutdown};
use crate::routing::HandlerRegistry;

/// Caller-supplied request handler.
///
/// Implemented for every `Fn(&Request, &dyn RequestExtractor) -> Result<Response, HandlerError>`.
/// Handlers are synchronous and run on Tokio's blocking pool, one invocation
/// per request.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(
        &self,
        request: &Request,
        extractor: &dyn RequestExtractor,
    ) -> Result<Response, HandlerError>;
}

impl<F> RequestHandler for F
where
    F: Fn(&Request, &dyn RequestExtractor) -> Result<Response, HandlerError> + Send + Sync + 'static,
{
    fn handle(
        &self,
        request: &Request,
        extractor: &dyn RequestExtractor,
    ) -> Result<Response, HandlerError> {
        self(request, extractor)
    }
}

/// An application that can register handlers and serve them.
pub trait Application {
    /// Bind and serve until stopped or until serving fails.
    fn start(&self) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Associate a path pattern with a handler. Only allowed before `start`.
    fn register<F>(&self, path: &str, handler: F) -> Result<(), ServerError>
    where
        F: Fn(&Request, &dyn RequestExtractor) -> Result<Response, HandlerError>
            + Send
            + Sync
            + 'static;

    /// Ask a running server to stop. Always succeeds.
    fn stop(&self) -> Result<(), ServerError>;
}

type SharedHandler = Arc<dyn RequestHandler>;

enum Phase {
    Configuring(HandlerRegistry<SharedHandler>),
    Serving,
}

/// State injected into the dispatch handler.
#[derive(Clone)]
struct DispatchState {
    registry: Arc<HandlerRegistry<SharedHandler>>,
    max_body_bytes: usize,
}

/// Default HTTP implementation of [`Application`].
pub struct DefaultApplicationServer {
    config: ServerConfig,
    phase: Mutex<Phase>,
    shutdown: Shutdown,
}

impl DefaultApplicationServer {
    /// Create a server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(Phase::Configuring(HandlerRegistry::new())),
            shutdown: Shutdown::new(),
        }
    }

    /// Create a server listening on all interfaces at `port`, other settings default.
    pub fn with_port(port: u16) -> Self {
        let mut config = ServerConfig::default();
        config.listener.port = port;
        Self::new(config)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns true once `start` or `serve` has taken over the registry.
    pub fn is_serving(&self) -> bool {
        matches!(*self.lock_phase(), Phase::Serving)
    }

    /// Register a handler value (for handlers that are structs, not closures).
    pub fn register_handler<H: RequestHandler>(
        &self,
        path: &str,
        handler: H,
    ) -> Result<(), ServerError> {
        match &mut *self.lock_phase() {
            Phase::Configuring(registry) => {
                let pattern = registry.insert(path, Arc::new(handler) as SharedHandler)?;
                tracing::debug!(pattern = %pattern, "Handler registered");
                Ok(())
            }
            Phase::Serving => Err(ServerError::RegisterAfterStart {
                pattern: path.to_string(),
            }),
        }
    }

    /// Serve on an already bound listener until stopped.
    ///
    /// Lets callers pick the socket (e.g. port 0 in tests).
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let address = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.config.listener.bind_address());

        // Subscribe first so a stop() racing the phase switch is not lost.
        let stop = self.shutdown.subscribe();
        let router = self.begin_serving()?;

        tracing::info!(address = %address, "HTTP server starting");

        axum::serve(listener, router)
            .with_graceful_shutdown(stop_signal(stop))
            .await
            .map_err(|source| ServerError::Startup {
                address: address.clone(),
                source,
            })?;

        tracing::info!(address = %address, "HTTP server stopped");
        Ok(())
    }

    /// Build the Axum router for a registry.
    fn build_router(config: &ServerConfig, registry: HandlerRegistry<SharedHandler>) -> Router {
        let state = DispatchState {
            registry: Arc::new(registry),
            max_body_bytes: config.limits.max_body_bytes,
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Move Configuring → Serving and freeze the registry into a router.
    fn begin_serving(&self) -> Result<Router, ServerError> {
        let mut phase = self.lock_phase();
        match std::mem::replace(&mut *phase, Phase::Serving) {
            Phase::Configuring(registry) => {
                tracing::info!(handlers = registry.len(), "Handler registry frozen");
                Ok(Self::build_router(&self.config, registry))
            }
            Phase::Serving => Err(ServerError::AlreadyStarted),
        }
    }

    fn lock_phase(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Application for DefaultApplicationServer {
    async fn start(&self) -> Result<(), ServerError> {
        if self.is_serving() {
            return Err(ServerError::AlreadyStarted);
        }

        let address = self.config.listener.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Startup {
                address: address.clone(),
                source,
            })?;

        self.serve(listener).await
    }

    fn register<F>(&self, path: &str, handler: F) -> Result<(), ServerError>
    where
        F: Fn(&Request, &dyn RequestExtractor) -> Result<Response, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register_handler(path, handler)
    }

    fn stop(&self) -> Result<(), ServerError> {
        tracing::info!(listeners = self.shutdown.receiver_count(), "Stop requested");
        self.shutdown.trigger();
        Ok(())
    }
}

/// Entry point for every request reaching the server.
async fn dispatch(
    State(state): State<DispatchState>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    let (pattern, handler) = match state.registry.lookup(&path) {
        Some((pattern, handler)) => (pattern.to_string(), handler.clone()),
        None => {
            tracing::debug!(method = %method, path = %path, "No handler registered");
            return not_found();
        }
    };

    let (head, body) = request.into_parts();
    let byte_body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                method = %method,
                path = %path,
                stage = "read_body",
                error = %e,
                "Failed to read request body"
            );
            return internal_server_error();
        }
    };
    let request = Request::new(head, byte_body);

    let outcome = tokio::task::spawn_blocking(move || invoke(handler.as_ref(), &request)).await;

    match outcome {
        Ok(Ok(response)) => write_response(response, &pattern, &path),
        Ok(Err(e)) => {
            tracing::warn!(
                method = %method,
                path = %path,
                pattern = %pattern,
                stage = "handler",
                error = %e,
                "Handler returned an error"
            );
            internal_server_error()
        }
        Err(e) => {
            tracing::error!(
                method = %method,
                path = %path,
                pattern = %pattern,
                stage = "handler",
                panicked = e.is_panic(),
                "Handler did not complete"
            );
            internal_server_error()
        }
    }
}

/// Build the extractor and call the handler. Runs on the blocking pool.
fn invoke(handler: &dyn RequestHandler, request: &Request) -> Result<Response, HandlerError> {
    let extractor = DefaultRequestExtractor::new(request);
    handler.handle(request, &extractor)
}

/// Map a handler's response onto the wire.
fn write_response(response: Response, pattern: &str, path: &str) -> axum::response::Response {
    if let Some(e) = &response.error {
        tracing::warn!(pattern = %pattern, path = %path, error = %e, "Handler response carries an error");
    }

    let status = match StatusCode::from_u16(response.effective_status()) {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(
                pattern = %pattern,
                status_code = response.status_code,
                stage = "status",
                "Handler returned an invalid status code"
            );
            return internal_server_error();
        }
    };

    let content_type = match HeaderValue::from_str(response.effective_content_type()) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                pattern = %pattern,
                content_type = %response.content_type,
                stage = "content_type",
                "Handler returned an invalid content type"
            );
            return internal_server_error();
        }
    };

    let body = match response.wire_body() {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(pattern = %pattern, stage = "serialize", error = %e, "Failed to serialize response body");
            return internal_server_error();
        }
    };

    let mut wire = axum::response::Response::new(axum::body::Body::from(body));
    *wire.status_mut() = status;
    wire.headers_mut().insert(header::CONTENT_TYPE, content_type);
    wire
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::{to_bytes, Body, Bytes};
    use tower::ServiceExt;

    use crate::http::error::ExtractError;

    fn server() -> DefaultApplicationServer {
        DefaultApplicationServer::new(ServerConfig::default())
    }

    fn router(server: &DefaultApplicationServer) -> Router {
        server.begin_serving().unwrap()
    }

    async fn call(router: Router, request: axum::http::Request<Body>) -> (StatusCode, String, Bytes) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body)
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let server = server();
        server
            .register("/ping", |_req: &Request, _ex: &dyn RequestExtractor| {
                Ok(Response::json(serde_json::json!({"pong": true})))
            })
            .unwrap();

        let (status, content_type, body) = call(router(&server), get("/ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        assert_eq!(body, Bytes::from_static(br#"{"pong":true}"#));
    }

    #[tokio::test]
    async fn test_explicit_status_and_content_type() {
        let server = server();
        server
            .register("/created", |_req: &Request, _ex: &dyn RequestExtractor| {
                Ok(Response::bytes("made").with_status(201).with_content_type("text/plain"))
            })
            .unwrap();

        let (status, content_type, body) = call(router(&server), get("/created")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(content_type, "text/plain");
        assert_eq!(body, Bytes::from_static(b"made"));
    }

    #[tokio::test]
    async fn test_byte_body_round_trip() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let server = server();
        server
            .register("/echo", |req: &Request, _ex: &dyn RequestExtractor| {
                Ok(Response::bytes(req.byte_body().clone()).with_content_type("application/octet-stream"))
            })
            .unwrap();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from(payload.clone()))
            .unwrap();
        let (status, _, body) = call(router(&server), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_empty_response_has_no_body() {
        let server = server();
        server
            .register("/nothing", |_req: &Request, _ex: &dyn RequestExtractor| {
                Ok(Response::new().with_status(204))
            })
            .unwrap();

        let (status, _, body) = call(router(&server), get("/nothing")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_is_opaque_500() {
        let server = server();
        server
            .register("/fail", |_req: &Request, _ex: &dyn RequestExtractor| {
                Err("database password leaked in message".into())
            })
            .unwrap();

        let (status, content_type, body) = call(router(&server), get("/fail")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(body, Bytes::from_static(b"Internal Server Error\n"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_500() {
        let server = server();
        server
            .register("/panic", |_req: &Request, _ex: &dyn RequestExtractor| -> Result<Response, HandlerError> {
                panic!("boom")
            })
            .unwrap();

        let (status, _, _) = call(router(&server), get("/panic")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_body_over_limit_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut config = ServerConfig::default();
        config.limits.max_body_bytes = 4;
        let server = DefaultApplicationServer::new(config);

        let counter = calls.clone();
        server
            .register("/upload", move |_req: &Request, _ex: &dyn RequestExtractor| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new())
            })
            .unwrap();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/upload")
            .body(Body::from("way too large"))
            .unwrap();
        let (status, _, _) = call(router(&server), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_body_read_error_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let server = server();

        let counter = calls.clone();
        server
            .register("/upload", move |_req: &Request, _ex: &dyn RequestExtractor| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new())
            })
            .unwrap();

        let broken = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/upload")
            .body(Body::from_stream(broken))
            .unwrap();
        let (status, _, _) = call(router(&server), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_query_still_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let server = server();

        let counter = calls.clone();
        server
            .register("/echo", move |req: &Request, ex: &dyn RequestExtractor| {
                counter.fetch_add(1, Ordering::SeqCst);
                let tag = ex.get_string_header("X-Tag")?;
                let query = match ex.get_string_query_param("q") {
                    Err(ExtractError::MalformedForm(_)) => "malformed".to_string(),
                    other => other?,
                };
                Ok(Response::bytes(format!("{tag}:{query}:{}", req.byte_body().len()))
                    .with_content_type("text/plain"))
            })
            .unwrap();

        for (uri, expected) in [
            ("/echo?discount=100%", "t:malformed:4"),
            ("/echo?a=1;b=2", "t:malformed:4"),
            ("/echo?q=%zz&ok=1", "t:malformed:4"),
            ("/echo?q=fine", "t:fine:4"),
        ] {
            let request = axum::http::Request::builder()
                .method("POST")
                .uri(uri)
                .header("X-Tag", "t")
                .body(Body::from("body"))
                .unwrap();
            let (status, _, body) = call(router(&server), request).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body, Bytes::from(expected), "{uri}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_serialization_failure_is_500() {
        struct Refuses;
        impl serde::Serialize for Refuses {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("no"))
            }
        }

        let server = server();
        server
            .register("/bad", |_req: &Request, _ex: &dyn RequestExtractor| {
                Ok(Response::json(Refuses).with_status(201))
            })
            .unwrap();

        let (status, _, body) = call(router(&server), get("/bad")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, Bytes::from_static(b"Internal Server Error\n"));
    }

    #[tokio::test]
    async fn test_invalid_status_is_500() {
        let server = server();
        server
            .register("/weird", |_req: &Request, _ex: &dyn RequestExtractor| {
                Ok(Response::new().with_status(42))
            })
            .unwrap();

        let (status, _, _) = call(router(&server), get("/weird")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unregistered_path_is_404() {
        let server = server();
        server
            .register("/known", |_req: &Request, _ex: &dyn RequestExtractor| Ok(Response::new()))
            .unwrap();

        let (status, _, body) = call(router(&server), get("/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, Bytes::from_static(b"404 page not found\n"));
    }

    #[tokio::test]
    async fn test_handler_sees_extractor_values() {
        let server = server();
        server
            .register("/sum", |_req: &Request, ex: &dyn RequestExtractor| {
                let values = ex.get_int_query_params("n")?;
                let scale = ex.get_int_header("X-Scale").unwrap_or(1);
                let sum: i64 = values.iter().sum();
                Ok(Response::json(sum * scale))
            })
            .unwrap();

        let request = axum::http::Request::builder()
            .uri("/sum?n=3&n=7")
            .header("x-scale", "2")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = call(router(&server), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(b"20"));

        let server = self::server();
        server
            .register("/sum", |_req: &Request, ex: &dyn RequestExtractor| {
                let values = ex.get_int_query_params("n")?;
                Ok(Response::json(values))
            })
            .unwrap();
        let (status, _, _) = call(router(&server), get("/sum?n=abc")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_register_after_start_rejected() {
        let server = server();
        server
            .register("/a", |_req: &Request, _ex: &dyn RequestExtractor| Ok(Response::new()))
            .unwrap();
        let _router = router(&server);

        assert!(server.is_serving());
        assert!(matches!(
            server.register("/b", |_req: &Request, _ex: &dyn RequestExtractor| Ok(Response::new())),
            Err(ServerError::RegisterAfterStart { .. })
        ));
        assert!(matches!(server.begin_serving(), Err(ServerError::AlreadyStarted)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let server = server();
        server
            .register("/a", |_req: &Request, _ex: &dyn RequestExtractor| Ok(Response::new()))
            .unwrap();
        assert!(matches!(
            server.register("/a", |_req: &Request, _ex: &dyn RequestExtractor| Ok(Response::new())),
            Err(ServerError::DuplicatePattern { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_right_after_serving_begins() {
        let server = Arc::new(server());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let serving = server.clone();
        let handle = tokio::spawn(async move { serving.serve(listener).await });

        while !server.is_serving() {
            tokio::task::yield_now().await;
        }
        assert_eq!(server.shutdown.receiver_count(), 1);
        server.stop().unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("stop signal was lost")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_stop_always_succeeds() {
        let server = server();
        assert!(server.stop().is_ok());
        assert!(server.stop().is_ok());
    }
}
