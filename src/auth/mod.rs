//! Session cookie handling and the page gate built on it.

pub mod gate;
pub mod session;

pub use gate::{AuthGate, AuthState, GateDecision, RouteGroup, protected_gate, public_gate};
pub use session::{AUTH_COOKIE, Session, SessionKeys, bearer_token};
