//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs, manager.rs):
//!     Validated config → Bind gRPC + HTTP listeners → Build dispatcher
//!
//! Serving (manager.rs):
//!     Spawn both servers → wait for signal or a server exit
//!
//! Shutdown (shutdown.rs):
//!     Broadcast stop → each server stops accepting → drain → close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then listeners, then serving
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: tasks are aborted after the grace period

pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use manager::Lifecycle;
pub use shutdown::{drain_within, Drain, Shutdown};
pub use startup::BoundListeners;
