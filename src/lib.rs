//! WebSocket reverse proxy library.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod routing;
pub mod session;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
