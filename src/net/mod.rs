//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (open-connection count and log naming)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Plaintext only; both listeners speak cleartext HTTP/1.1 or h2c

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker};
pub use listener::{bind_tcp, ConnectionPermit, Listener, ListenerError};
