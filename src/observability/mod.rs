//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! server.rs / dispatch
//!     → tracing events with structured fields
//!     → logging.rs (subscriber: env filter + fmt layer)
//!     → stdout (pretty or JSON lines)
//! ```
//!
//! # Design Decisions
//! - Structured logging via the `tracing` crate
//! - `RUST_LOG` overrides the configured level

pub mod logging;

pub use logging::init_logging;
