//! Request envelope handed to handlers.
//!
//! # Responsibilities
//! - Carry the transport request head (method, URI, headers)
//! - Carry the fully read body bytes
//! - Provide access to the extractor and on-demand body decoding
//!
//! # Design Decisions
//! - Body is read completely before a handler runs; handlers never stream
//! - Read-only to handlers; discarded once the handler returns
//! - Decoding is generic over the target type instead of storing an opaque value

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use crate::http::extractor::DefaultRequestExtractor;

/// An incoming request with its body already in memory.
#[derive(Debug)]
pub struct Request {
    head: Parts,
    byte_body: Bytes,
}

impl Request {
    /// Build a request from a transport head and the body read from it.
    pub fn new(head: Parts, byte_body: Bytes) -> Self {
        Self { head, byte_body }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Full request URI as received.
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.head.uri.query()
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Transport request head.
    pub fn head(&self) -> &Parts {
        &self.head
    }

    /// Raw body bytes. Empty, never absent, when the client sent no body.
    pub fn byte_body(&self) -> &Bytes {
        &self.byte_body
    }

    /// Decode the body as JSON into any deserializable type.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.byte_body)
    }

    /// Build an extractor over this request's headers and form values.
    pub fn extractor(&self) -> DefaultRequestExtractor<'_> {
        DefaultRequestExtractor::new(self)
    }
}

impl<B: Into<Bytes>> From<axum::http::Request<B>> for Request {
    fn from(req: axum::http::Request<B>) -> Self {
        let (head, body) = req.into_parts();
        Self::new(head, body.into())
    }
}
