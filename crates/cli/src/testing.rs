//! In-memory fakes for the page driver, prompt and notification channel.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stockwatch_protocol::{Cookie, NotificationPayload};
use stockwatch_runtime::{AuthSignal, Availability, DriverError, PageDriver, ProductSnapshot};
use tokio::time::Instant;

use crate::config::{SessionPolicy, WatchParameters};
use crate::error::NotifyError;
use crate::notify::{Delivered, NotificationChannel, Prompt};
use crate::session::SessionManager;
use crate::store::CookieStore;

pub const TARGET_LABEL: &str = "Hot Wheels Ferrari 250 GTO Toy Car & Hauler";
pub const TARGET_URL: &str = "https://shop.example/prn/hot-wheels-ferrari/prid/42";

pub fn sample_parameters() -> WatchParameters {
	WatchParameters {
		target_url: TARGET_URL.to_string(),
		target_product_label: TARGET_LABEL.to_string(),
		location_label: "Home".to_string(),
		check_interval_seconds: 30,
		continue_on_out_of_stock: false,
		notification_credentials: None,
	}
}

struct SignalScript {
	queue: VecDeque<bool>,
	then: bool,
}

impl SignalScript {
	fn next(&mut self) -> bool {
		self.queue.pop_front().unwrap_or(self.then)
	}
}

fn signal_index(signal: AuthSignal) -> usize {
	match signal {
		AuthSignal::UiIndicator => 0,
		AuthSignal::StorageToken => 1,
		AuthSignal::GatedContent => 2,
	}
}

/// Scripted [`PageDriver`] that records every call.
pub struct FakeDriver {
	products: Mutex<VecDeque<Result<ProductSnapshot, DriverError>>>,
	fallback_product: Mutex<Option<ProductSnapshot>>,
	carts: Mutex<VecDeque<Vec<String>>>,
	signals: Mutex<[SignalScript; 3]>,
	browser_cookies: Mutex<Vec<Cookie>>,
	installed: Mutex<Vec<Cookie>>,
	page: Mutex<Page>,
	calls: Mutex<Vec<String>>,
}

/// Which page the fake browser is showing.
#[derive(Default)]
struct Page {
	url: Option<String>,
	product: Option<String>,
}

impl Page {
	fn on_product(&self) -> bool {
		self.url.is_some() && self.url == self.product
	}
}

impl Default for FakeDriver {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeDriver {
	/// Every signal probes negative until scripted otherwise.
	pub fn new() -> Self {
		let quiet = || SignalScript {
			queue: VecDeque::new(),
			then: false,
		};
		Self {
			products: Mutex::new(VecDeque::new()),
			fallback_product: Mutex::new(None),
			carts: Mutex::new(VecDeque::new()),
			signals: Mutex::new([quiet(), quiet(), quiet()]),
			browser_cookies: Mutex::new(vec![Cookie::new("sid", "fresh", ".shop.example").with_expires(4_000_000_000.0)]),
			installed: Mutex::new(Vec::new()),
			page: Mutex::new(Page::default()),
			calls: Mutex::new(Vec::new()),
		}
	}

	/// A driver whose every auth probe answers `true`.
	pub fn logged_in() -> Self {
		let driver = Self::new();
		for signal in AuthSignal::ALL {
			driver.script_signal(signal, &[], true);
		}
		driver
	}

	/// Replaces the answers for `signal`: `script` first, then `then` forever.
	pub fn script_signal(&self, signal: AuthSignal, script: &[bool], then: bool) {
		self.signals.lock()[signal_index(signal)] = SignalScript {
			queue: script.iter().copied().collect(),
			then,
		};
	}

	pub fn push_product(&self, name: &str, availability: Availability) {
		self.products.lock().push_back(Ok(ProductSnapshot {
			name: name.to_string(),
			availability,
		}));
	}

	pub fn push_product_error(&self, error: DriverError) {
		self.products.lock().push_back(Err(error));
	}

	/// Answer for `load_product` once the queue is empty.
	pub fn set_fallback_product(&self, name: &str, availability: Availability) {
		*self.fallback_product.lock() = Some(ProductSnapshot {
			name: name.to_string(),
			availability,
		});
	}

	pub fn push_cart(&self, items: &[&str]) {
		self.carts.lock().push_back(items.iter().map(|s| s.to_string()).collect());
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	pub fn count_calls(&self, prefix: &str) -> usize {
		self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
	}

	pub fn position(&self, prefix: &str) -> Option<usize> {
		self.calls.lock().iter().position(|c| c.starts_with(prefix))
	}

	pub fn installed_cookies(&self) -> Vec<Cookie> {
		self.installed.lock().clone()
	}

	fn record(&self, call: impl Into<String>) {
		self.calls.lock().push(call.into());
	}
}

#[async_trait]
impl PageDriver for FakeDriver {
	async fn navigate(&self, url: &str) -> Result<(), DriverError> {
		self.record(format!("navigate:{url}"));
		self.page.lock().url = Some(url.to_string());
		Ok(())
	}

	async fn load_product(&self, url: &str) -> Result<ProductSnapshot, DriverError> {
		self.record(format!("load_product:{url}"));
		{
			let mut page = self.page.lock();
			page.url = Some(url.to_string());
			page.product = Some(url.to_string());
		}
		if let Some(next) = self.products.lock().pop_front() {
			return next;
		}
		self.fallback_product
			.lock()
			.clone()
			.ok_or_else(|| DriverError::Extraction("no scripted product".into()))
	}

	async fn add_to_cart(&self) -> Result<(), DriverError> {
		self.record("add_to_cart");
		let page = self.page.lock();
		if page.on_product() {
			Ok(())
		} else {
			Err(DriverError::ElementNotFound(format!("add button on {}", page.url.as_deref().unwrap_or("about:blank"))))
		}
	}

	async fn cart_items(&self) -> Result<Vec<String>, DriverError> {
		self.record("cart_items");
		Ok(self.carts.lock().pop_front().unwrap_or_default())
	}

	async fn probe(&self, signal: AuthSignal) -> Result<bool, DriverError> {
		self.record(format!("probe:{signal}"));
		Ok(self.signals.lock()[signal_index(signal)].next())
	}

	async fn cookies(&self) -> Result<Vec<Cookie>, DriverError> {
		self.record("cookies");
		Ok(self.browser_cookies.lock().clone())
	}

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), DriverError> {
		self.record(format!("set_cookies:{}", cookies.len()));
		self.installed.lock().extend_from_slice(cookies);
		Ok(())
	}

	async fn select_location(&self, label: &str) -> Result<bool, DriverError> {
		self.record(format!("select_location:{label}"));
		Ok(true)
	}

	async fn close(&self) -> Result<(), DriverError> {
		self.record("close");
		Ok(())
	}
}

enum PromptMode {
	Scripted(Mutex<VecDeque<String>>),
	Delayed(String, Duration),
	Silent,
}

/// Prompt with canned answers. Exhausted scripts read as closed input.
pub struct ScriptedPrompt {
	mode: PromptMode,
	asked: Mutex<Vec<(String, Instant)>>,
	abandoned: Mutex<usize>,
}

impl ScriptedPrompt {
	fn with_mode(mode: PromptMode) -> Self {
		Self {
			mode,
			asked: Mutex::new(Vec::new()),
			abandoned: Mutex::new(0),
		}
	}

	pub fn new(answers: &[&str]) -> Self {
		Self::with_mode(PromptMode::Scripted(Mutex::new(answers.iter().map(|s| s.to_string()).collect())))
	}

	/// Answers `answer` after `delay`.
	pub fn delayed(answer: &str, delay: Duration) -> Self {
		Self::with_mode(PromptMode::Delayed(answer.to_string(), delay))
	}

	/// Never answers.
	pub fn silent() -> Self {
		Self::with_mode(PromptMode::Silent)
	}

	pub fn abandoned(&self) -> usize {
		*self.abandoned.lock()
	}

	pub fn questions(&self) -> Vec<String> {
		self.asked.lock().iter().map(|(q, _)| q.clone()).collect()
	}

	pub fn asked_at(&self) -> Vec<Instant> {
		self.asked.lock().iter().map(|(_, at)| *at).collect()
	}
}

#[async_trait]
impl Prompt for ScriptedPrompt {
	async fn ask(&self, question: &str) -> Result<Option<String>, NotifyError> {
		self.asked.lock().push((question.to_string(), Instant::now()));
		match &self.mode {
			PromptMode::Scripted(answers) => Ok(answers.lock().pop_front()),
			PromptMode::Delayed(answer, delay) => {
				tokio::time::sleep(*delay).await;
				Ok(Some(answer.clone()))
			}
			PromptMode::Silent => std::future::pending().await,
		}
	}

	fn abandon(&self) {
		*self.abandoned.lock() += 1;
	}
}

/// Channel that keeps every payload it is asked to send.
pub struct RecordingChannel {
	buttons: bool,
	fail: bool,
	sent: Mutex<Vec<NotificationPayload>>,
}

impl RecordingChannel {
	/// Terminal-like channel without button support.
	pub fn new() -> Self {
		Self {
			buttons: false,
			fail: false,
			sent: Mutex::new(Vec::new()),
		}
	}

	pub fn with_buttons() -> Self {
		Self { buttons: true, ..Self::new() }
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Self::with_buttons() }
	}

	pub fn sent(&self) -> Vec<NotificationPayload> {
		self.sent.lock().clone()
	}
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
	fn name(&self) -> &'static str {
		"recording"
	}

	fn supports_buttons(&self) -> bool {
		self.buttons
	}

	async fn send(&self, payload: &NotificationPayload) -> Result<Delivered, NotifyError> {
		if self.fail {
			return Err(NotifyError::Api("sendMessage: Bad Gateway".into()));
		}
		let mut sent = self.sent.lock();
		sent.push(payload.clone());
		Ok(Delivered {
			message_id: Some(sent.len() as i64),
		})
	}
}

/// Session manager over `driver` with a cookie store in `dir`.
pub fn session_manager(driver: Arc<FakeDriver>, prompt: Arc<ScriptedPrompt>, dir: &Path) -> SessionManager {
	SessionManager::new(driver, CookieStore::in_dir(dir), prompt, SessionPolicy::default(), "https://shop.example")
}

/// Writes one long-lived cookie so the manager can short-circuit.
pub fn seed_live_cookie(dir: &Path) {
	CookieStore::in_dir(dir)
		.save(&[Cookie::new("sid", "stored", ".shop.example").with_expires(4_000_000_000.0)])
		.unwrap();
}
