//! Minimal application server façade over Axum.
//!
//! Register path handlers, receive each request as a [`Request`] envelope with
//! typed header and query accessors, and return a [`Response`] that the server
//! maps onto the wire.
//!
//! ```no_run
//! use appserver::{Application, DefaultApplicationServer, Request, RequestExtractor, Response};
//!
//! # async fn run() -> Result<(), appserver::ServerError> {
//! let server = DefaultApplicationServer::with_port(8080);
//! server.register("/hello", |_req: &Request, ex: &dyn RequestExtractor| {
//!     let name = ex.get_string_query_param("name").unwrap_or_else(|_| "world".into());
//!     Ok(Response::json(format!("hello, {name}")))
//! })?;
//! server.start().await
//! # }
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::{
    Application, DefaultApplicationServer, DefaultRequestExtractor, ExtractError, HandlerError,
    Request, RequestExtractor, RequestHandler, Response, ServerError,
};
