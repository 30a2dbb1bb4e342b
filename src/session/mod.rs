//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! axum WebSocket ──→ Leg (downstream) ──┐
//!                                       ├── relay.rs ── driver.rs (state.rs transitions)
//! tungstenite stream → Leg (upstream) ──┘
//! ```
//!
//! # Design Decisions
//! - A session is a task, not an entry in a shared table
//! - Frames are converted once, at the leg boundary (frame.rs)
//! - Live sessions are counted with RAII guards (tracker.rs)

pub mod driver;
pub mod frame;
pub mod leg;
pub mod relay;
pub mod state;
pub mod tracker;

pub use driver::{Session, SessionContext};
pub use frame::{CloseReason, Frame, Side};
pub use leg::{Leg, LegHandle};
pub use relay::RelayOutcome;
pub use state::{SessionEvent, SessionMachine, SessionState, TransitionError};
pub use tracker::{SessionId, SessionTracker};
