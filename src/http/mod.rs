//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (hyper; malformed requests get 400 there)
//!     → server.rs dispatch
//!         non-GET        → 403
//!         /              → portal.rs page
//!         /favicon.ico   → 404
//!         anything else  → websocket.rs upgrade → Session
//!     → response.rs (status bodies, headers)
//! ```

pub mod portal;
pub mod response;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
