//! Configuration: policy constants from an optional JSON file, and the
//! immutable [`WatchParameters`] snapshot built once per process.
//!
//! Precedence is CLI flag, then config file, then built-in default.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stockwatch_runtime::{DriverTiming, PageSelectors};
use tracing::debug;
use url::Url;

use crate::error::{StoreError, WatchError};

/// Policy constants read from `config.json`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
	pub detect_interval_secs: u64,
	pub detect_attempts: u32,
	pub storage_wait_secs: u64,
	pub storage_progress_secs: u64,
	pub manual_decline_limit: u32,
	pub match_threshold: f64,
	pub retry_pause_secs: u64,
	pub auth_recheck_every: u64,
	pub navigation_timeout_secs: u64,
	pub settle_millis: u64,
	pub selectors: PageSelectors,
}

impl Default for FileConfig {
	fn default() -> Self {
		Self {
			detect_interval_secs: 60,
			detect_attempts: 10,
			storage_wait_secs: 90,
			storage_progress_secs: 30,
			manual_decline_limit: 2,
			match_threshold: 0.90,
			retry_pause_secs: 5,
			auth_recheck_every: 10,
			navigation_timeout_secs: 30,
			settle_millis: 2000,
			selectors: PageSelectors::default(),
		}
	}
}

impl FileConfig {
	/// Loads `explicit`, or the default location if it exists, or defaults.
	///
	/// An explicit path that does not exist is an error; a missing default
	/// file is not.
	pub fn load(explicit: Option<&Path>) -> Result<Self, WatchError> {
		let (path, required) = match explicit {
			Some(path) => (path.to_path_buf(), true),
			None => match default_config_path() {
				Some(path) => (path, false),
				None => return Ok(Self::default()),
			},
		};

		let content = match std::fs::read_to_string(&path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
				debug!(target = "stockwatch", path = %path.display(), "no config file; using defaults");
				return Ok(Self::default());
			}
			Err(source) => return Err(StoreError::Io { path, source }.into()),
		};

		let config: Self = serde_json::from_str(&content).map_err(|source| StoreError::Json { path: path.clone(), source })?;
		config.validate()?;
		debug!(target = "stockwatch", path = %path.display(), "loaded config file");
		Ok(config)
	}

	fn validate(&self) -> Result<(), WatchError> {
		if !(0.0..=1.0).contains(&self.match_threshold) {
			return Err(WatchError::Config(format!("matchThreshold must be within 0.0..=1.0, got {}", self.match_threshold)));
		}
		if self.detect_attempts == 0 || self.manual_decline_limit == 0 || self.auth_recheck_every == 0 {
			return Err(WatchError::Config("detectAttempts, manualDeclineLimit and authRecheckEvery must be at least 1".into()));
		}
		Ok(())
	}

	pub fn session_policy(&self) -> SessionPolicy {
		SessionPolicy {
			detect_interval: Duration::from_secs(self.detect_interval_secs),
			detect_attempts: self.detect_attempts,
			storage_wait: Duration::from_secs(self.storage_wait_secs),
			storage_progress: Duration::from_secs(self.storage_progress_secs.max(1)),
			manual_decline_limit: self.manual_decline_limit,
		}
	}

	pub fn poll_policy(&self) -> PollPolicy {
		PollPolicy {
			match_threshold: self.match_threshold,
			auth_recheck_every: self.auth_recheck_every,
		}
	}

	pub fn retry_pause(&self) -> Duration {
		Duration::from_secs(self.retry_pause_secs)
	}

	pub fn driver_timing(&self) -> DriverTiming {
		DriverTiming {
			navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
			settle: Duration::from_millis(self.settle_millis),
		}
	}
}

/// `<config dir>/stockwatch/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("stockwatch").join("config.json"))
}

/// Timing constants of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
	pub detect_interval: Duration,
	pub detect_attempts: u32,
	pub storage_wait: Duration,
	pub storage_progress: Duration,
	pub manual_decline_limit: u32,
}

impl Default for SessionPolicy {
	fn default() -> Self {
		FileConfig::default().session_policy()
	}
}

/// Matching and pacing knobs of one watch cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
	pub match_threshold: f64,
	pub auth_recheck_every: u64,
}

impl Default for PollPolicy {
	fn default() -> Self {
		Self {
			match_threshold: 0.90,
			auth_recheck_every: 10,
		}
	}
}

/// The two opaque notification secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct NotificationCredentials {
	pub bot_token: String,
	pub channel_id: String,
}

impl fmt::Debug for NotificationCredentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NotificationCredentials")
			.field("bot_token", &"<redacted>")
			.field("channel_id", &self.channel_id)
			.finish()
	}
}

impl NotificationCredentials {
	/// Returns credentials only when both secrets are present and non-empty.
	pub fn from_parts(bot_token: Option<String>, channel_id: Option<String>) -> Option<Self> {
		match (bot_token, channel_id) {
			(Some(bot_token), Some(channel_id)) if !bot_token.trim().is_empty() && !channel_id.trim().is_empty() => Some(Self {
				bot_token: bot_token.trim().to_string(),
				channel_id: channel_id.trim().to_string(),
			}),
			_ => None,
		}
	}
}

/// Everything one watch cycle needs from the operator. Never mutated after
/// construction; every retry cycle receives an identical copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchParameters {
	pub target_url: String,
	/// Empty means "the name shown on the first successful load".
	pub target_product_label: String,
	pub location_label: String,
	pub check_interval_seconds: u64,
	pub continue_on_out_of_stock: bool,
	pub notification_credentials: Option<NotificationCredentials>,
}

impl WatchParameters {
	pub fn check_interval(&self) -> Duration {
		Duration::from_secs(self.check_interval_seconds)
	}

	/// Scheme, host and port of the target URL.
	pub fn origin(&self) -> String {
		Url::parse(&self.target_url)
			.map(|u| u.origin().ascii_serialization())
			.unwrap_or_else(|_| self.target_url.clone())
	}
}

/// Checks a user-supplied product URL.
pub fn validate_target_url(raw: &str) -> Result<String, WatchError> {
	let trimmed = raw.trim();
	let url = Url::parse(trimmed).map_err(|e| WatchError::Config(format!("invalid product URL '{trimmed}': {e}")))?;
	match url.scheme() {
		"http" | "https" if url.host_str().is_some() => Ok(url.to_string()),
		_ => Err(WatchError::Config(format!("product URL must be http(s) with a host, got '{trimmed}'"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_keys_fall_back_to_defaults() {
		let config: FileConfig = serde_json::from_str(r#"{"storageWaitSecs":120,"matchThreshold":0.85}"#).unwrap();
		assert_eq!(config.storage_wait_secs, 120);
		assert_eq!(config.match_threshold, 0.85);
		assert_eq!(config.detect_interval_secs, 60);
		assert_eq!(config.detect_attempts, 10);
		assert_eq!(config.retry_pause_secs, 5);
	}

	#[test]
	fn explicit_missing_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = FileConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
		assert!(matches!(err, WatchError::Store(StoreError::Io { .. })));
	}

	#[test]
	fn out_of_range_threshold_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, r#"{"matchThreshold":1.5}"#).unwrap();
		assert!(matches!(FileConfig::load(Some(&path)), Err(WatchError::Config(_))));
	}

	#[test]
	fn file_values_reach_policies() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, r#"{"detectIntervalSecs":5,"detectAttempts":3,"settleMillis":250}"#).unwrap();
		let config = FileConfig::load(Some(&path)).unwrap();
		let policy = config.session_policy();
		assert_eq!(policy.detect_interval, Duration::from_secs(5));
		assert_eq!(policy.detect_attempts, 3);
		assert_eq!(policy.storage_wait, Duration::from_secs(90));
		assert_eq!(config.driver_timing().settle, Duration::from_millis(250));
	}

	#[test]
	fn credentials_require_both_secrets() {
		assert!(NotificationCredentials::from_parts(Some("t".into()), None).is_none());
		assert!(NotificationCredentials::from_parts(Some(" ".into()), Some("@c".into())).is_none());
		let creds = NotificationCredentials::from_parts(Some("123:abc".into()), Some("@chan".into())).unwrap();
		assert!(!format!("{creds:?}").contains("123:abc"));
	}

	#[test]
	fn target_url_must_be_http() {
		assert_eq!(validate_target_url(" https://shop.example/p/1 ").unwrap(), "https://shop.example/p/1");
		assert!(validate_target_url("ftp://shop.example/p").is_err());
		assert!(validate_target_url("not a url").is_err());
	}

	#[test]
	fn origin_strips_path_and_query() {
		let params = WatchParameters {
			target_url: "https://shop.example:8443/prn/widget/prid/42?x=1".into(),
			target_product_label: String::new(),
			location_label: "Home".into(),
			check_interval_seconds: 30,
			continue_on_out_of_stock: false,
			notification_credentials: None,
		};
		assert_eq!(params.origin(), "https://shop.example:8443");
		assert_eq!(params.check_interval(), Duration::from_secs(30));
	}
}
