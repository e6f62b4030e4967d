//! Session authentication.
//!
//! Detects an operator login in the watched browser, waits for the site to
//! commit it, verifies it, and persists the cookie set so later runs can
//! short-circuit.

/// Detection state machine and the [`SessionManager`] driving it.
pub mod manager;
/// Session states.
pub mod state;

use chrono::{DateTime, Utc};
use stockwatch_protocol::Cookie;

pub use manager::{AuthOutcome, SessionManager};
pub use state::SessionState;

/// An authenticated cookie set. Replaced wholesale, never edited per cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
	pub cookies: Vec<Cookie>,
	pub captured_at: DateTime<Utc>,
	pub valid: bool,
}

impl Session {
	pub fn captured(cookies: Vec<Cookie>) -> Self {
		Self {
			cookies,
			captured_at: Utc::now(),
			valid: true,
		}
	}
}

/// Current wall-clock time in epoch seconds, as cookie expiries use.
pub fn epoch_now() -> f64 {
	Utc::now().timestamp_millis() as f64 / 1000.0
}
