//! Error types for the server, the handler boundary and parameter extraction.

use std::fmt;

use thiserror::Error;

/// Error returned by request handlers.
///
/// Boxed so handlers can propagate any error type with `?`. The server logs
/// it and answers with a plain 500; the message never reaches the client.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Where an extractor looked for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Header,
    PathParam,
    QueryParam,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Header => write!(f, "header"),
            ParamSource::PathParam => write!(f, "path parameter"),
            ParamSource::QueryParam => write!(f, "query parameter"),
        }
    }
}

/// Errors produced by [`RequestExtractor`](crate::http::RequestExtractor) getters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// No value is associated with the name.
    #[error("{origin} '{name}' not found")]
    NotFound { origin: ParamSource, name: String },

    /// A value exists but cannot be converted to the requested type.
    #[error("{origin} '{name}': cannot parse '{value}' as {expected}")]
    Parse {
        origin: ParamSource,
        name: String,
        value: String,
        expected: &'static str,
    },

    /// The source is not available in this layer.
    #[error("{origin} '{name}' cannot be extracted: no path templates are registered")]
    Unsupported { origin: ParamSource, name: String },

    /// The query string or form body could not be parsed.
    #[error("malformed form data: {0}")]
    MalformedForm(String),
}

/// Failure to turn a structured response body into bytes.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from configuring or running the application server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving failed.
    #[error("failed to start http server on {address}: {source}")]
    Startup {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called on a server that is already serving.
    #[error("server already started")]
    AlreadyStarted,

    /// Handlers can only be registered before the server starts.
    #[error("cannot register '{pattern}': server already started")]
    RegisterAfterStart { pattern: String },

    /// The path pattern is not usable.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// A handler is already registered for the pattern.
    #[error("multiple registrations for '{pattern}'")]
    DuplicatePattern { pattern: String },
}
