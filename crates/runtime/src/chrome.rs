//! [`PageDriver`] over the Chrome DevTools Protocol.

use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use stockwatch_protocol::Cookie;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::driver::{AuthSignal, Availability, PageDriver, ProductSnapshot};
use crate::error::{DriverError, Result};
use crate::launcher::{LaunchOptions, fetch_cdp_endpoint, http_base, launch_chrome, page_target};
use crate::process::pid_is_alive;
use crate::selectors::{ExtractionScripts, PageSelectors};

/// Page-load timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTiming {
	/// Upper bound on `Page.loadEventFired` after a navigation.
	pub navigation_timeout: Duration,
	/// Pause after load and after clicks so client-side rendering settles.
	pub settle: Duration,
}

impl Default for DriverTiming {
	fn default() -> Self {
		Self {
			navigation_timeout: Duration::from_secs(30),
			settle: Duration::from_millis(2000),
		}
	}
}

/// How [`ChromeDriver::start`] obtains a browser.
#[derive(Debug, Clone)]
pub struct ChromeOptions {
	/// Attach to this DevTools endpoint instead of launching.
	pub cdp_endpoint: Option<String>,
	pub executable: Option<PathBuf>,
	pub user_data_dir: PathBuf,
	pub headless: bool,
	pub port: Option<u16>,
	pub selectors: PageSelectors,
	pub timing: DriverTiming,
}

/// A single browser page driven over DevTools.
pub struct ChromeDriver {
	connection: Connection,
	scripts: ExtractionScripts,
	timing: DriverTiming,
	child: Mutex<Option<Child>>,
}

impl ChromeDriver {
	/// Launches or attaches to a browser and connects to one of its pages.
	pub async fn start(options: ChromeOptions) -> Result<Self> {
		let (base, child) = match &options.cdp_endpoint {
			Some(endpoint) => {
				let base = http_base(endpoint);
				let version = fetch_cdp_endpoint(&base).await?;
				info!(target = "stockwatch.driver", endpoint = %base, browser = ?version.browser, "attaching to running browser");
				(base, None)
			}
			None => {
				let launched = launch_chrome(&LaunchOptions {
					executable: options.executable.clone(),
					user_data_dir: options.user_data_dir.clone(),
					headless: options.headless,
					port: options.port,
				})
				.await?;
				(launched.http_endpoint, Some(launched.child))
			}
		};

		let target = page_target(&base).await?;
		let ws_url = target
			.web_socket_debugger_url
			.ok_or_else(|| DriverError::Protocol(format!("page target {} has no WebSocket URL", target.id)))?;

		let command_timeout = options.timing.navigation_timeout + Duration::from_secs(5);
		let connection = Connection::connect(&ws_url, command_timeout).await?;
		for domain in ["Page.enable", "Network.enable", "Runtime.enable"] {
			connection.send(domain, json!({})).await?;
		}

		Ok(Self {
			connection,
			scripts: ExtractionScripts::new(&options.selectors),
			timing: options.timing,
			child: Mutex::new(child),
		})
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		let result = self
			.connection
			.send(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;
		evaluation_value(result)
	}

	async fn evaluate_bool(&self, expression: &str) -> Result<bool> {
		Ok(self.evaluate(expression).await?.as_bool().unwrap_or(false))
	}

	async fn settle(&self) {
		tokio::time::sleep(self.timing.settle).await;
	}
}

/// Unwraps a `Runtime.evaluate` result, surfacing thrown exceptions.
fn evaluation_value(result: Value) -> Result<Value> {
	if let Some(exception) = result.get("exceptionDetails") {
		let message = exception
			.get("exception")
			.and_then(|e| e.get("description"))
			.and_then(Value::as_str)
			.or_else(|| exception.get("text").and_then(Value::as_str))
			.unwrap_or("unknown exception");
		return Err(DriverError::JsException(message.to_string()));
	}
	Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(Value::Null))
}

fn parse_snapshot(value: &Value) -> Result<ProductSnapshot> {
	let name = value
		.get("name")
		.and_then(Value::as_str)
		.map(str::trim)
		.ok_or_else(|| DriverError::Extraction("product script returned no name".into()))?;
	let availability = value.get("availability").and_then(Value::as_str).map(Availability::from_script).unwrap_or(Availability::Unknown);
	Ok(ProductSnapshot {
		name: name.to_string(),
		availability,
	})
}

fn cookie_params(cookies: &[Cookie]) -> Result<Value> {
	let mut params = Vec::with_capacity(cookies.len());
	for cookie in cookies {
		let mut value = serde_json::to_value(cookie).map_err(|e| DriverError::Protocol(format!("failed to encode cookie {}: {e}", cookie.name)))?;
		if cookie.is_session() {
			if let Some(map) = value.as_object_mut() {
				map.remove("expires");
			}
		}
		params.push(value);
	}
	Ok(json!({ "cookies": params }))
}

#[async_trait]
impl PageDriver for ChromeDriver {
	async fn navigate(&self, url: &str) -> Result<()> {
		let mut events = self.connection.subscribe();
		let result = self
			.connection
			.send("Page.navigate", json!({ "url": url }))
			.await
			.map_err(|e| match e {
				DriverError::Cdp { message, .. } => DriverError::Navigation {
					url: url.to_string(),
					reason: message,
				},
				other => other,
			})?;

		if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
			return Err(DriverError::Navigation {
				url: url.to_string(),
				reason: error_text.to_string(),
			});
		}

		match self
			.connection
			.wait_for_event(&mut events, "Page.loadEventFired", self.timing.navigation_timeout)
			.await
		{
			Ok(_) => {}
			Err(DriverError::Timeout { .. }) => {
				return Err(DriverError::Navigation {
					url: url.to_string(),
					reason: format!("load event not fired within {:?}", self.timing.navigation_timeout),
				});
			}
			Err(e) => return Err(e),
		}

		debug!(target = "stockwatch.driver", url, "page loaded");
		self.settle().await;
		Ok(())
	}

	async fn load_product(&self, url: &str) -> Result<ProductSnapshot> {
		self.navigate(url).await?;
		let value = self.evaluate(&self.scripts.product).await?;
		parse_snapshot(&value)
	}

	async fn add_to_cart(&self) -> Result<()> {
		if !self.evaluate_bool(&self.scripts.add_to_cart).await? {
			return Err(DriverError::ElementNotFound("enabled add-to-cart control".into()));
		}
		self.settle().await;
		Ok(())
	}

	async fn cart_items(&self) -> Result<Vec<String>> {
		if !self.evaluate_bool(&self.scripts.open_cart).await? {
			warn!(target = "stockwatch.driver", "cart control not found; reading items from current page");
		}
		self.settle().await;

		let value = self.evaluate(&self.scripts.cart_items).await?;
		let items = value
			.as_array()
			.ok_or_else(|| DriverError::Extraction("cart script returned no list".into()))?
			.iter()
			.filter_map(Value::as_str)
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect();
		Ok(items)
	}

	async fn probe(&self, signal: AuthSignal) -> Result<bool> {
		let script = match signal {
			AuthSignal::UiIndicator => &self.scripts.ui_indicator,
			AuthSignal::StorageToken => &self.scripts.storage_token,
			AuthSignal::GatedContent => &self.scripts.gated_content,
		};
		self.evaluate_bool(script).await
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let result = self.connection.send("Network.getAllCookies", json!({})).await?;
		let cookies = result.get("cookies").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
		serde_json::from_value(cookies).map_err(|e| DriverError::Protocol(format!("failed to parse cookies: {e}")))
	}

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
		if cookies.is_empty() {
			return Ok(());
		}
		self.connection.send("Network.setCookies", cookie_params(cookies)?).await?;
		debug!(target = "stockwatch.driver", count = cookies.len(), "cookies installed");
		Ok(())
	}

	async fn select_location(&self, label: &str) -> Result<bool> {
		if !self.evaluate_bool(&self.scripts.open_location_picker).await? {
			return Ok(false);
		}
		tokio::time::sleep(Duration::from_secs(1)).await;
		let chosen = self.evaluate_bool(&self.scripts.choose_location(label)).await?;
		if chosen {
			self.settle().await;
		}
		Ok(chosen)
	}

	/// Shuts down a browser this driver launched; an attached browser is only
	/// disconnected from.
	async fn close(&self) -> Result<()> {
		let child = self.child.lock().take();
		let Some(mut child) = child else {
			info!(target = "stockwatch.driver", "detaching from attached browser");
			self.connection.disconnect().await;
			return Ok(());
		};

		if let Err(e) = self.connection.send("Browser.close", json!({})).await {
			debug!(target = "stockwatch.driver", error = %e, "Browser.close failed");
		}
		if pid_is_alive(child.id()) {
			let _ = child.kill();
		}
		let _ = child.wait();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use futures_util::StreamExt;
	use stockwatch_protocol::SameSite;
	use tokio::net::TcpListener;
	use tokio_tungstenite::tungstenite::Message;

	use super::*;

	#[tokio::test]
	async fn closing_an_attached_browser_only_disconnects() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let browser = tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
			let mut commands = Vec::new();
			while let Some(Ok(frame)) = socket.next().await {
				match frame {
					Message::Text(text) => commands.push(text.to_string()),
					Message::Close(_) => break,
					_ => {}
				}
			}
			commands
		});

		let driver = ChromeDriver {
			connection: Connection::connect(&format!("ws://{addr}"), Duration::from_secs(1)).await.unwrap(),
			scripts: ExtractionScripts::new(&PageSelectors::default()),
			timing: DriverTiming::default(),
			child: Mutex::new(None),
		};
		driver.close().await.unwrap();

		let commands = tokio::time::timeout(Duration::from_secs(5), browser).await.unwrap().unwrap();
		assert!(commands.iter().all(|c| !c.contains("Browser.close")), "sent {commands:?}");
	}

	#[test]
	fn evaluation_returns_value() {
		let value = evaluation_value(json!({ "result": { "type": "object", "value": { "name": "Widget" } } })).unwrap();
		assert_eq!(value["name"], "Widget");
	}

	#[test]
	fn evaluation_surfaces_exceptions() {
		let err = evaluation_value(json!({
			"result": { "type": "object" },
			"exceptionDetails": { "text": "Uncaught", "exception": { "description": "ReferenceError: x is not defined" } }
		}))
		.unwrap_err();
		assert!(matches!(err, DriverError::JsException(m) if m.contains("ReferenceError")));
	}

	#[test]
	fn snapshot_parses_script_shape() {
		let snapshot = parse_snapshot(&json!({ "name": "  Hot Wheels Car  ", "availability": "coming_soon" })).unwrap();
		assert_eq!(snapshot.name, "Hot Wheels Car");
		assert_eq!(snapshot.availability, Availability::ComingSoon);
	}

	#[test]
	fn snapshot_without_name_is_extraction_error() {
		assert!(matches!(parse_snapshot(&Value::Null), Err(DriverError::Extraction(_))));
	}

	#[test]
	fn session_cookies_omit_expires() {
		let session = Cookie::new("sid", "abc", ".shop.example");
		let persistent = Cookie::new("pref", "1", ".shop.example").with_expires(2_000_000_000.0);
		let params = cookie_params(&[session, persistent]).unwrap();
		let list = params["cookies"].as_array().unwrap();
		assert!(list[0].get("expires").is_none());
		assert_eq!(list[1]["expires"], 2_000_000_000.0);
		assert_eq!(list[0]["httpOnly"], false);
	}

	#[test]
	fn devtools_cookie_shape_deserializes() {
		let cookies: Vec<Cookie> = serde_json::from_value(json!([{
			"name": "sid", "value": "v", "domain": ".shop.example", "path": "/",
			"expires": -1, "size": 4, "httpOnly": true, "secure": true, "session": true,
			"sameSite": "Strict", "priority": "Medium"
		}]))
		.unwrap();
		assert!(cookies[0].http_only);
		assert_eq!(cookies[0].same_site, SameSite::Strict);
		assert!(cookies[0].is_session());
	}
}
