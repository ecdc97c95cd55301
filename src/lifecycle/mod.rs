//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! start() / serve():
//!     subscribe to Shutdown → serve until stop_signal resolves
//!
//! stop():
//!     Shutdown::trigger → serving loop stops accepting → in-flight requests finish
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::stop_signal;
