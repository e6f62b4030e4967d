//! Status artifact written at each meaningful watch transition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse watch state reported in the status artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
	Monitoring,
	Available,
	AddedToCart,
	Purchased,
	Stopped,
	Error,
}

impl WatchStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Monitoring => "monitoring",
			Self::Available => "available",
			Self::AddedToCart => "added_to_cart",
			Self::Purchased => "purchased",
			Self::Stopped => "stopped",
			Self::Error => "error",
		}
	}
}

impl std::fmt::Display for WatchStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// On-disk status record.
///
/// `timestamp` is an ISO-8601 string produced by the writer; `details` is a
/// free-form object whose keys depend on the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
	pub status: WatchStatus,
	pub query_count: u64,
	pub timestamp: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub product_url: Option<String>,
	#[serde(default)]
	pub action_needed: bool,
	#[serde(default)]
	pub details: Map<String, Value>,
}

impl StatusRecord {
	pub fn new(status: WatchStatus, query_count: u64, timestamp: impl Into<String>) -> Self {
		Self {
			status,
			query_count,
			timestamp: timestamp.into(),
			product_url: None,
			action_needed: status == WatchStatus::Available,
			details: Map::new(),
		}
	}

	pub fn with_product_url(mut self, url: impl Into<String>) -> Self {
		self.product_url = Some(url.into());
		self
	}

	pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
		self.details.insert(key.to_string(), value.into());
		self
	}
}
