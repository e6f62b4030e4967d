//! Error types for the watch core.

use std::path::PathBuf;

use stockwatch_runtime::DriverError;
use thiserror::Error;

/// Failures reading or writing the cookie store or status file.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Malformed JSON in {path}: {source}")]
	Json {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

/// Failures delivering a notification or reading an operator answer.
#[derive(Debug, Error)]
pub enum NotifyError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Telegram API error: {0}")]
	Api(String),

	#[error("Failed to encode request: {0}")]
	Encode(#[from] serde_json::Error),

	#[error("Terminal input unavailable: {0}")]
	Prompt(String),
}

/// Failures of the session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("No login detected after {attempts} detection rounds and {declines} declined confirmations")]
	AuthTimeout { attempts: u32, declines: u32 },

	#[error("Session verification failed after login")]
	VerificationFailed,

	#[error(transparent)]
	Driver(#[from] DriverError),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Prompt(#[from] NotifyError),

	#[error("Interrupted")]
	Interrupted,
}

impl SessionError {
	/// Returns `true` when the process cannot continue without a session.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::AuthTimeout { .. } | Self::Interrupted)
	}
}

/// Top-level error for a watch run.
#[derive(Debug, Error)]
pub enum WatchError {
	#[error(transparent)]
	Session(#[from] SessionError),

	#[error(transparent)]
	Driver(#[from] DriverError),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Notify(#[from] NotifyError),

	#[error("Invalid configuration: {0}")]
	Config(String),

	#[error("Interrupted")]
	Interrupted,
}

impl WatchError {
	/// Process exit status for this error.
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::Interrupted | Self::Session(SessionError::Interrupted) => 130,
			Self::Session(SessionError::AuthTimeout { .. }) => 2,
			_ => 1,
		}
	}
}

/// Marker returned by cancellable waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for SessionError {
	fn from(_: Cancelled) -> Self {
		Self::Interrupted
	}
}

impl From<Cancelled> for WatchError {
	fn from(_: Cancelled) -> Self {
		Self::Interrupted
	}
}

pub type Result<T> = std::result::Result<T, WatchError>;
