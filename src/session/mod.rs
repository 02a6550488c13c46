//! Client-runtime session state and refresh coordination.
//!
//! [`SessionState`] is the observable "current session" snapshot;
//! [`RefreshCoordinator`] is the only component allowed to transition it
//! based on backend calls, and guarantees at most one in-flight refresh.

mod refresh;
mod state;

pub use refresh::{REFRESH_THRESHOLD_SECS, RefreshCoordinator, RefreshError};
pub use state::{Authenticated, Session, SessionState};
