//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting
//!             → live sessions send Close(1001) to both legs
//!             → server waits for the session count to drain
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, close sessions, drain
//! - Drain has a deadline; sessions still open after it are dropped

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
