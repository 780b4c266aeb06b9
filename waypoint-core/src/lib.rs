//! Shared primitives for Waypoint
//!
//! Small types used by every other crate in the workspace: the injectable
//! clock that drives circuit breakers and cache expiry, request priorities,
//! and the session context attached to recorded errors.

pub mod clock;
pub mod types;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use types::{Priority, PriorityParseError, RequestContext};
