//! Session state and route access.
//!
//! This module provides:
//! - `SessionRecord`: the signed-in identity and its bearer token
//! - `SessionContext`: the in-memory session holder, restored from storage
//! - `RouteGuard` with `ProtectedRoute` and `PublicRoute`: per-route access gates
//!
//! Nothing here tracks token expiry. The server reports rotation and expiry
//! through response headers handled by the request executor.

pub mod guard;
pub mod record;
pub mod session;

pub use guard::{Access, ProtectedRoute, PublicRoute, RouteGuard};
pub use record::SessionRecord;
pub use session::{SessionContext, SessionState};
