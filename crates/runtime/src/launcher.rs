//! Browser launch and DevTools endpoint probing.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{DriverError, Result};
use crate::finder::find_chrome_executable;
use crate::process::pick_debug_port;

const DEFAULT_DEBUG_PORT: u16 = 9333;
const ENDPOINT_POLL_ATTEMPTS: usize = 25;
const ENDPOINT_POLL_DELAY: Duration = Duration::from_millis(200);

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
}

/// `/json/list` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	pub id: String,
	#[serde(rename = "type")]
	pub target_type: String,
	#[serde(default)]
	pub url: String,
	pub web_socket_debugger_url: Option<String>,
}

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	pub executable: Option<PathBuf>,
	pub user_data_dir: PathBuf,
	pub headless: bool,
	pub port: Option<u16>,
}

/// A browser process started by [`launch_chrome`].
#[derive(Debug)]
pub struct LaunchedBrowser {
	pub child: Child,
	pub http_endpoint: String,
	pub version: CdpVersionInfo,
}

/// Launches a Chromium-family browser with remote debugging enabled.
///
/// Waits until `/json/version` answers or the process exits.
pub async fn launch_chrome(options: &LaunchOptions) -> Result<LaunchedBrowser> {
	let chrome_path = find_chrome_executable(options.executable.as_deref()).ok_or_else(|| {
		DriverError::Launch(
			"Could not find a Chrome/Chromium executable. \n\
             Install Chrome or pass --chrome-path."
				.into(),
		)
	})?;
	let port = pick_debug_port(options.port.unwrap_or(DEFAULT_DEBUG_PORT))?;

	std::fs::create_dir_all(&options.user_data_dir)
		.map_err(|e| DriverError::Launch(format!("Failed to create profile dir {}: {}", options.user_data_dir.display(), e)))?;

	let args = launch_args(port, &options.user_data_dir, options.headless);
	info!(target = "stockwatch.driver", path = %chrome_path.display(), port, headless = options.headless, "launching browser");

	let mut cmd = Command::new(&chrome_path);
	cmd.args(&args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

	let mut child = cmd
		.spawn()
		.map_err(|e| DriverError::Launch(format!("Failed to launch {}: {}", chrome_path.display(), e)))?;

	let http_endpoint = format!("http://127.0.0.1:{}", port);
	let mut last_error = "endpoint not reachable".to_string();
	for _ in 0..ENDPOINT_POLL_ATTEMPTS {
		tokio::time::sleep(ENDPOINT_POLL_DELAY).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(DriverError::Launch(format!(
				"Browser exited before its debugging endpoint became available (status: {})",
				status
			)));
		}

		match fetch_cdp_endpoint(&http_endpoint).await {
			Ok(version) => {
				debug!(target = "stockwatch.driver", browser = ?version.browser, "debugging endpoint ready");
				return Ok(LaunchedBrowser {
					child,
					http_endpoint,
					version,
				});
			}
			Err(e) => last_error = e.to_string(),
		}
	}

	let _ = child.kill();
	Err(DriverError::Launch(format!(
		"Browser launched but debugging endpoint not available on port {}. Last error: {}",
		port, last_error
	)))
}

fn launch_args(port: u16, user_data_dir: &Path, headless: bool) -> Vec<String> {
	let mut args = vec![
		format!("--remote-debugging-port={}", port),
		format!("--user-data-dir={}", user_data_dir.display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
	];
	if headless {
		args.push("--headless=new".to_string());
	}
	args.push("about:blank".to_string());
	args
}

fn http_client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(Duration::from_millis(800))
		.build()
		.map_err(|e| DriverError::Protocol(format!("Failed to create HTTP client: {}", e)))
}

/// Normalizes `ws://`/`http://` endpoint input to the HTTP base URL.
pub fn http_base(endpoint: &str) -> String {
	let trimmed = endpoint.trim_end_matches('/');
	let without_scheme = trimmed
		.strip_prefix("ws://")
		.or_else(|| trimmed.strip_prefix("http://"))
		.unwrap_or(trimmed);
	let host = without_scheme.split('/').next().unwrap_or(without_scheme);
	format!("http://{}", host)
}

/// Resolves version metadata from `{base}/json/version`.
pub async fn fetch_cdp_endpoint(base: &str) -> Result<CdpVersionInfo> {
	let url = format!("{}/json/version", base);
	let response = http_client()?.get(&url).send().await.map_err(|e| DriverError::Connection {
		url: url.clone(),
		reason: e.to_string(),
	})?;

	if !response.status().is_success() {
		return Err(DriverError::Connection {
			url,
			reason: format!("unexpected status {}", response.status()),
		});
	}

	response
		.json()
		.await
		.map_err(|e| DriverError::Protocol(format!("Failed to parse /json/version: {}", e)))
}

/// Returns a page target to drive, opening a blank one when none exists.
pub async fn page_target(base: &str) -> Result<TargetInfo> {
	let client = http_client()?;
	let list_url = format!("{}/json/list", base);
	let targets: Vec<TargetInfo> = client
		.get(&list_url)
		.send()
		.await
		.map_err(|e| DriverError::Connection {
			url: list_url.clone(),
			reason: e.to_string(),
		})?
		.json()
		.await
		.map_err(|e| DriverError::Protocol(format!("Failed to parse /json/list: {}", e)))?;

	if let Some(page) = select_page_target(targets) {
		return Ok(page);
	}

	let new_url = format!("{}/json/new?about:blank", base);
	client
		.put(&new_url)
		.send()
		.await
		.map_err(|e| DriverError::Connection {
			url: new_url,
			reason: e.to_string(),
		})?
		.json()
		.await
		.map_err(|e| DriverError::Protocol(format!("Failed to parse /json/new: {}", e)))
}

fn select_page_target(targets: Vec<TargetInfo>) -> Option<TargetInfo> {
	targets
		.into_iter()
		.find(|t| t.target_type == "page" && t.web_socket_debugger_url.is_some() && !t.url.starts_with("devtools://"))
}
