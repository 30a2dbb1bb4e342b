//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (side, kind, key, target, error)
//!     → one "session" span per proxied connection
//!     → TraceLayer spans per HTTP request
//!
//! logging.rs installs the subscriber that writes them out.
//! ```

pub mod logging;
