//! Error types for the page driver.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`PageDriver`](crate::PageDriver) implementations.
#[derive(Debug, Error)]
pub enum DriverError {
	#[error("Browser launch failed: {0}")]
	Launch(String),

	#[error("Failed to connect to DevTools at {url}: {reason}")]
	Connection { url: String, reason: String },

	#[error("CDP error {code}: {message}")]
	Cdp { code: i64, message: String },

	#[error("CDP command '{method}' timed out after {duration:?}")]
	Timeout { method: String, duration: Duration },

	#[error("CDP protocol error: {0}")]
	Protocol(String),

	#[error("Navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("Extraction failed: {0}")]
	Extraction(String),

	#[error("JavaScript exception: {0}")]
	JsException(String),

	#[error("Element not found: {0}")]
	ElementNotFound(String),

	#[error("DevTools connection closed")]
	Closed,
}

impl DriverError {
	/// Returns `true` for failures a later attempt may not repeat.
	///
	/// Launch and connection failures mean there is no page to retry against.
	pub fn is_transient(&self) -> bool {
		!matches!(self, Self::Launch(_) | Self::Connection { .. } | Self::Closed)
	}
}

pub type Result<T> = std::result::Result<T, DriverError>;
