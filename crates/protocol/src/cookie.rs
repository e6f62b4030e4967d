//! Cookie store entries.
//!
//! The cookie store is a JSON array of [`Cookie`] objects. The same shape is
//! accepted by `Network.setCookies` and returned by `Network.getAllCookies`, so
//! entries round-trip between the browser and disk without conversion.

use serde::{Deserialize, Serialize};

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	#[default]
	Lax,
	None,
}

/// A single browser cookie.
///
/// `expires` is seconds since the Unix epoch; a negative value marks a
/// session cookie that never expires on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	pub domain: String,
	#[serde(default = "default_path")]
	pub path: String,
	#[serde(default = "session_expiry")]
	pub expires: f64,
	#[serde(default)]
	pub secure: bool,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub same_site: SameSite,
}

fn default_path() -> String {
	"/".to_string()
}

fn session_expiry() -> f64 {
	-1.0
}

impl Cookie {
	/// Creates a session cookie for `domain` with default attributes.
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: domain.into(),
			path: default_path(),
			expires: session_expiry(),
			secure: false,
			http_only: false,
			same_site: SameSite::default(),
		}
	}

	/// Sets an absolute expiry (seconds since epoch).
	pub fn with_expires(mut self, expires: f64) -> Self {
		self.expires = expires;
		self
	}

	/// Returns `true` for cookies without an absolute expiry.
	pub fn is_session(&self) -> bool {
		self.expires < 0.0
	}

	/// Returns `true` when the cookie expired at or before `now` (epoch seconds).
	pub fn is_expired_at(&self, now: f64) -> bool {
		!self.is_session() && self.expires <= now
	}
}

/// Returns `true` when at least one cookie in `cookies` is still usable at `now`.
pub fn has_live_cookie(cookies: &[Cookie], now: f64) -> bool {
	cookies.iter().any(|c| !c.value.is_empty() && !c.is_expired_at(now))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cookie_uses_store_field_names() {
		let cookie = Cookie::new("sid", "abc", ".shop.example").with_expires(1_900_000_000.0);
		let value = serde_json::to_value(&cookie).unwrap();
		assert_eq!(value["name"], "sid");
		assert_eq!(value["httpOnly"], false);
		assert_eq!(value["sameSite"], "Lax");
		assert_eq!(value["expires"], 1_900_000_000.0);
		assert_eq!(value["path"], "/");
	}

	#[test]
	fn cookie_accepts_devtools_shape_with_extra_fields() {
		let json = r#"{
			"name": "session",
			"value": "token",
			"domain": ".example.com",
			"path": "/",
			"expires": -1,
			"size": 12,
			"httpOnly": true,
			"secure": true,
			"session": true,
			"sameSite": "None",
			"priority": "Medium"
		}"#;
		let cookie: Cookie = serde_json::from_str(json).unwrap();
		assert!(cookie.http_only);
		assert_eq!(cookie.same_site, SameSite::None);
		assert!(cookie.is_session());
	}

	#[test]
	fn missing_optional_attributes_take_defaults() {
		let cookie: Cookie = serde_json::from_str(r#"{"name":"a","value":"b","domain":"x.test"}"#).unwrap();
		assert_eq!(cookie.path, "/");
		assert!(cookie.is_session());
		assert_eq!(cookie.same_site, SameSite::Lax);
	}

	#[test]
	fn expiry_is_inclusive_of_now() {
		let cookie = Cookie::new("a", "b", "x.test").with_expires(100.0);
		assert!(cookie.is_expired_at(100.0));
		assert!(!cookie.is_expired_at(99.5));
		assert!(!Cookie::new("a", "b", "x.test").is_expired_at(f64::MAX));
	}

	#[test]
	fn live_cookie_requires_value_and_future_expiry() {
		let expired = Cookie::new("old", "v", "x.test").with_expires(10.0);
		let empty = Cookie::new("blank", "", "x.test");
		assert!(!has_live_cookie(&[expired.clone(), empty.clone()], 50.0));
		assert!(has_live_cookie(&[expired, empty, Cookie::new("sid", "v", "x.test")], 50.0));
		assert!(!has_live_cookie(&[], 50.0));
	}
}
