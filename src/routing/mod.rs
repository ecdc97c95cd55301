//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before start):
//!     register(pattern, handler)
//!     → matcher.rs (validate pattern: exact or subtree)
//!     → router.rs (insert, reject duplicates)
//!
//! Dispatch (while serving):
//!     request path
//!     → router.rs (exact match, else longest subtree)
//!     → matched handler or NoMatch (404)
//! ```
//!
//! # Design Decisions
//! - Registry owned by the server instance, never global
//! - Frozen behind an `Arc` once serving starts (no locks on lookup)
//! - Patterns ending in `/` match their whole subtree

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::HandlerRegistry;
