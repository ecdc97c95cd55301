//! Response envelope and its mapping onto the wire.
//!
//! # Responsibilities
//! - Carry what a handler wants to send (status, content type, body)
//! - Serialize structured bodies at the boundary
//! - Build the plain-text error responses used by dispatch
//!
//! # Design Decisions
//! - Status 0 means 200, empty content type means `application/json`
//! - A structured body wins over raw bytes when both are set
//! - Every internal failure is the same opaque 500 text

use std::collections::HashMap;
use std::fmt;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use serde::Serialize;

use crate::http::error::{HandlerError, PayloadError};

/// Content type written when a response does not set one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Ability to turn a structured body into bytes.
///
/// Implemented for every `Serialize` type, encoding as JSON.
pub trait Payload: Send {
    fn to_bytes(&self) -> Result<Vec<u8>, PayloadError>;
}

impl<T: Serialize + Send> Payload for T {
    fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// What a handler returns on success.
#[derive(Default)]
pub struct Response {
    /// Raw bytes written verbatim when no structured body is set.
    pub byte_body: Option<Bytes>,
    /// Structured body, serialized when the response is written.
    pub body: Option<Box<dyn Payload>>,
    /// 0 means 200.
    pub status_code: u16,
    /// Empty means `application/json`.
    pub content_type: String,
    /// Logged by the server, never sent to the client.
    pub error: Option<HandlerError>,
    /// Carried for handlers and callers; not written to the wire.
    pub headers: HashMap<String, String>,
}

impl Response {
    /// Empty 200 response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Response with a structured body.
    pub fn json<T: Serialize + Send + 'static>(body: T) -> Self {
        Self {
            body: Some(Box::new(body)),
            ..Self::default()
        }
    }

    /// Response with a raw byte body.
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self {
            byte_body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<HandlerError>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Status code that will be written.
    pub fn effective_status(&self) -> u16 {
        if self.status_code == 0 {
            StatusCode::OK.as_u16()
        } else {
            self.status_code
        }
    }

    /// Content type that will be written.
    pub fn effective_content_type(&self) -> &str {
        if self.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            &self.content_type
        }
    }

    /// Bytes that will be written: serialized structured body, else raw bytes,
    /// else nothing.
    pub fn wire_body(&self) -> Result<Bytes, PayloadError> {
        match (&self.body, &self.byte_body) {
            (Some(body), _) => Ok(Bytes::from(body.to_bytes()?)),
            (None, Some(bytes)) => Ok(bytes.clone()),
            (None, None) => Ok(Bytes::new()),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status_code", &self.status_code)
            .field("content_type", &self.content_type)
            .field("has_body", &self.body.is_some())
            .field("byte_body", &self.byte_body)
            .field("error", &self.error)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Plain-text error response carrying only the canonical status text.
pub(crate) fn status_text_response(status: StatusCode, text: &str) -> axum::response::Response {
    let mut response = axum::response::Response::new(Body::from(format!("{text}\n")));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// The uniform 500 used for every dispatch failure.
pub(crate) fn internal_server_error() -> axum::response::Response {
    status_text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Response for paths with no registered handler.
pub(crate) fn not_found() -> axum::response::Response {
    status_text_response(StatusCode::NOT_FOUND, "404 page not found")
}
