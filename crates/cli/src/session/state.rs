use std::fmt;

/// States of the authentication state machine.
///
/// `Persisted` is the success state. `Unauthenticated { failed: true }` is
/// where a failed detection or verification lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Unauthenticated { failed: bool },
	Detecting,
	ManualConfirmPending,
	StorageWait,
	Verifying,
	Persisted,
}

impl SessionState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Unauthenticated { failed: false } => "unauthenticated",
			Self::Unauthenticated { failed: true } => "unauthenticated(failed)",
			Self::Detecting => "detecting",
			Self::ManualConfirmPending => "manual_confirm_pending",
			Self::StorageWait => "storage_wait",
			Self::Verifying => "verifying",
			Self::Persisted => "persisted",
		}
	}
}

impl Default for SessionState {
	fn default() -> Self {
		Self::Unauthenticated { failed: false }
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
