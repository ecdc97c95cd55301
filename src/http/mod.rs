//! HTTP façade: envelopes, extraction and the application server.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, registry lookup, body read)
//!     → request.rs (Request envelope: head + body bytes)
//!     → extractor.rs (typed header / query getters)
//!     → caller's handler
//!     → response.rs (defaults, serialization, error responses)
//!     → Send to client
//! ```

pub mod error;
pub mod extractor;
pub mod request;
pub mod response;
pub mod server;

pub use error::{ExtractError, HandlerError, ParamSource, PayloadError, ServerError};
pub use extractor::{DefaultRequestExtractor, RequestExtractor};
pub use request::Request;
pub use response::{Payload, Response, DEFAULT_CONTENT_TYPE};
pub use server::{Application, DefaultApplicationServer, RequestHandler};
