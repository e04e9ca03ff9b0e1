//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     (method, template, target)[]
//!     → template.rs (parse `{name:type}` segments)
//!     → table.rs (register in order, reject duplicates)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, raw path)
//!     → table.rs (walk routes, newest first)
//!     → template.rs (segment match + percent-decode)
//!     → Return: matched target with captured params, or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - Last registered route wins when several templates fit

pub mod table;
pub mod template;

use thiserror::Error;

pub use table::{Route, RouteMatch, RouteTable};
pub use template::{ParamKind, PathParams, PathTemplate, Segment};

/// Errors raised while building the route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("variable `{name}` declared twice in `{template}`")]
    DuplicateVariable { template: String, name: String },

    #[error("route {method} {template} registered twice")]
    DuplicateRoute { method: String, template: String },
}
