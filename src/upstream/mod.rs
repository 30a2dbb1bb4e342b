//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! NodeDescriptor + forward path
//!     → connector.rs (target URI, client handshake)
//!     → Leg (writer running) or HandshakeFailed / ConnectTimeout
//! ```

pub mod connector;

pub use connector::UpstreamConnector;
