//! Demo application server.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ listener ─▶ registry lookup ─▶ body read ─▶ extractor ─▶ handler
//!                                                                              │
//!     Client Response                                                          ▼
//!     ◀───────────── status + Content-Type + body ◀──────────────────── Response
//! ```
//!
//! Registered paths:
//! - `/echo`  returns the request body with the request's content type
//! - `/sum`   sums repeated `n` query parameters
//! - `/greet` greets the caller named in the `X-Name` header

use std::path::PathBuf;

use appserver::config::{load_config, ServerConfig};
use appserver::observability::init_logging;
use appserver::{
    Application, DefaultApplicationServer, ExtractError, HandlerError, Request, RequestExtractor,
    Response,
};
use clap::Parser;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "appserver")]
#[command(about = "Demo server for the appserver handler façade", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listener port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Serialize)]
struct Sum {
    values: Vec<i64>,
    sum: i64,
}

#[derive(Serialize)]
struct Greeting {
    message: String,
    shout: bool,
}

fn echo(request: &Request, _extractor: &dyn RequestExtractor) -> Result<Response, HandlerError> {
    let content_type = request
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    Ok(Response::bytes(request.byte_body().clone()).with_content_type(content_type))
}

fn sum(_request: &Request, extractor: &dyn RequestExtractor) -> Result<Response, HandlerError> {
    let values = match extractor.get_int_query_params("n") {
        Ok(values) => values,
        Err(e @ ExtractError::Parse { .. }) => {
            return Ok(Response::json(serde_json::json!({ "error": e.to_string() })).with_status(400))
        }
        Err(e) => return Err(e.into()),
    };
    let sum = values.iter().sum();

    Ok(Response::json(Sum { values, sum }))
}

fn greet(_request: &Request, extractor: &dyn RequestExtractor) -> Result<Response, HandlerError> {
    let name = match extractor.get_string_header("X-Name") {
        Ok(name) => name,
        Err(ExtractError::NotFound { .. }) => "stranger".to_string(),
        Err(e) => return Err(e.into()),
    };
    let shout = extractor.get_bool_query_param("shout").unwrap_or(false);

    let mut message = format!("Hello, {name}!");
    if shout {
        message = message.to_uppercase();
    }

    Ok(Response::json(Greeting { message, shout }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        max_body_bytes = config.limits.max_body_bytes,
        "Configuration loaded"
    );

    let server = DefaultApplicationServer::new(config);
    server.register("/echo", echo)?;
    server.register("/sum", sum)?;
    server.register("/greet", greet)?;

    server.start().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
