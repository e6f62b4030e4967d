use std::sync::Arc;
use std::time::Duration;

use stockwatch_protocol::{Cookie, has_live_cookie};
use stockwatch_runtime::{AuthSignal, PageDriver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Session, SessionState, epoch_now};
use crate::config::SessionPolicy;
use crate::error::{Cancelled, SessionError};
use crate::notify::{Prompt, parse_yes_no};
use crate::pace;
use crate::store::CookieStore;

pub const LOGIN_QUESTION: &str = "Have you logged in to the shop in the browser window? [y/n]";

/// How [`SessionManager::ensure_authenticated`] obtained its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
	/// An existing session passed the liveness check.
	AlreadyValid,
	/// A new login was detected, verified and persisted.
	Authenticated,
}

/// Owns the browser session and the cookie store.
///
/// The first call restores the stored cookie set when it still holds a live
/// cookie. Otherwise the manager walks `Detecting -> (ManualConfirmPending) ->
/// StorageWait -> Verifying -> Persisted`, and only the `Persisted` step writes
/// the store.
pub struct SessionManager {
	driver: Arc<dyn PageDriver>,
	store: CookieStore,
	prompt: Arc<dyn Prompt>,
	policy: SessionPolicy,
	origin: String,
	state: SessionState,
	session: Option<Session>,
	store_checked: bool,
	history: Vec<SessionState>,
}

impl SessionManager {
	pub fn new(
		driver: Arc<dyn PageDriver>,
		store: CookieStore,
		prompt: Arc<dyn Prompt>,
		policy: SessionPolicy,
		origin: impl Into<String>,
	) -> Self {
		Self {
			driver,
			store,
			prompt,
			policy,
			origin: origin.into(),
			state: SessionState::default(),
			session: None,
			store_checked: false,
			history: Vec::new(),
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Every state entered through a transition, oldest first.
	pub fn history(&self) -> &[SessionState] {
		&self.history
	}

	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	/// Returns once the browser holds a verified session.
	///
	/// A valid session that fails its liveness check is dropped wholesale and
	/// the state machine restarts from `Unauthenticated`.
	pub async fn ensure_authenticated(&mut self, cancel: &CancellationToken) -> Result<AuthOutcome, SessionError> {
		if self.session.as_ref().is_some_and(|s| s.valid) {
			if self.is_live(cancel).await? {
				debug!(target = "stockwatch.session", "session still live");
				return Ok(AuthOutcome::AlreadyValid);
			}
			warn!(target = "stockwatch.session", "AuthInvalidated: session failed its liveness check, logging in again");
			self.invalidate();
		} else if !self.store_checked {
			self.store_checked = true;
			if self.restore(cancel).await? {
				return Ok(AuthOutcome::AlreadyValid);
			}
		}

		self.authenticate(cancel).await
	}

	async fn restore(&mut self, cancel: &CancellationToken) -> Result<bool, SessionError> {
		let stored = match self.store.load() {
			Ok(cookies) => cookies,
			Err(e) => {
				warn!(target = "stockwatch.session", error = %e, "ignoring unreadable cookie store");
				Vec::new()
			}
		};

		let now = epoch_now();
		if !has_live_cookie(&stored, now) {
			info!(target = "stockwatch.session", path = %self.store.path().display(), "no live stored session");
			return Ok(false);
		}

		let live: Vec<Cookie> = stored.into_iter().filter(|c| !c.is_expired_at(now)).collect();
		if let Err(e) = pace::guard(cancel, self.driver.set_cookies(&live)).await? {
			warn!(target = "stockwatch.session", error = %e, "could not inject stored cookies");
			return Ok(false);
		}

		if !self.is_live(cancel).await? {
			info!(target = "stockwatch.session", "stored session was rejected by the site");
			return Ok(false);
		}

		info!(target = "stockwatch.session", cookies = live.len(), "restored stored session");
		self.session = Some(Session::captured(live));
		self.state = SessionState::Persisted;
		Ok(true)
	}

	async fn authenticate(&mut self, cancel: &CancellationToken) -> Result<AuthOutcome, SessionError> {
		let mut declines = 0;
		loop {
			self.transition(SessionState::Detecting);
			if self.detect(cancel, declines == 0).await? {
				break;
			}

			self.transition(SessionState::ManualConfirmPending);
			let answer = pace::guard(cancel, self.prompt.ask(LOGIN_QUESTION)).await??;
			if parse_yes_no(answer.as_deref()) {
				info!(target = "stockwatch.session", "operator confirmed login");
				break;
			}

			declines += 1;
			if declines >= self.policy.manual_decline_limit {
				self.fail();
				return Err(SessionError::AuthTimeout {
					attempts: self.policy.detect_attempts.saturating_mul(declines),
					declines,
				});
			}
			warn!(target = "stockwatch.session", declines, "login not confirmed, watching for it again");
		}

		self.transition(SessionState::StorageWait);
		self.wait_for_storage(cancel).await?;

		self.transition(SessionState::Verifying);
		if !self.is_live(cancel).await? {
			self.fail();
			return Err(SessionError::VerificationFailed);
		}

		let cookies = pace::guard(cancel, self.driver.cookies()).await??;
		self.store.save(&cookies)?;
		info!(target = "stockwatch.session", cookies = cookies.len(), "session persisted");
		self.session = Some(Session::captured(cookies));
		self.transition(SessionState::Persisted);
		Ok(AuthOutcome::Authenticated)
	}

	/// Probes at a fixed cadence until a signal fires or the attempts run out.
	async fn detect(&self, cancel: &CancellationToken, open_site: bool) -> Result<bool, Cancelled> {
		if open_site {
			if let Err(e) = pace::guard(cancel, self.driver.navigate(&self.origin)).await? {
				warn!(target = "stockwatch.session", error = %e, "could not open the shop, probing the current page");
			}
			info!(target = "stockwatch.session", origin = %self.origin, "please log in using the browser window");
		}

		for attempt in 1..=self.policy.detect_attempts {
			if let Some(signal) = self.first_signal(cancel).await? {
				info!(target = "stockwatch.session", %signal, attempt, "login detected");
				return Ok(true);
			}
			debug!(target = "stockwatch.session", attempt, of = self.policy.detect_attempts, "no login signal yet");
			pace::sleep(cancel, self.policy.detect_interval).await?;
		}

		info!(target = "stockwatch.session", attempts = self.policy.detect_attempts, "no login signal within the detection window");
		Ok(false)
	}

	async fn first_signal(&self, cancel: &CancellationToken) -> Result<Option<AuthSignal>, Cancelled> {
		for signal in AuthSignal::ALL {
			match pace::guard(cancel, self.driver.probe(signal)).await? {
				Ok(true) => return Ok(Some(signal)),
				Ok(false) => {}
				Err(e) => debug!(target = "stockwatch.session", %signal, error = %e, "probe failed"),
			}
		}
		Ok(None)
	}

	async fn wait_for_storage(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
		let total = self.policy.storage_wait;
		let step = if self.policy.storage_progress.is_zero() {
			total
		} else {
			self.policy.storage_progress
		};

		info!(target = "stockwatch.session", secs = total.as_secs(), "waiting for the site to commit session cookies");
		let mut waited = Duration::ZERO;
		while waited < total {
			let chunk = step.min(total - waited);
			pace::sleep(cancel, chunk).await?;
			waited += chunk;
			info!(
				target = "stockwatch.session",
				waited_secs = waited.as_secs(),
				remaining_secs = (total - waited).as_secs(),
				"storage wait"
			);
		}
		Ok(())
	}

	/// Navigates to the shop origin and runs the UI indicator probe.
	async fn is_live(&self, cancel: &CancellationToken) -> Result<bool, Cancelled> {
		let check = async {
			self.driver.navigate(&self.origin).await?;
			self.driver.probe(AuthSignal::UiIndicator).await
		};
		match pace::guard(cancel, check).await? {
			Ok(live) => Ok(live),
			Err(e) => {
				debug!(target = "stockwatch.session", error = %e, "liveness check failed");
				Ok(false)
			}
		}
	}

	fn invalidate(&mut self) {
		self.session = None;
		self.transition(SessionState::Unauthenticated { failed: false });
	}

	fn fail(&mut self) {
		self.session = None;
		self.transition(SessionState::Unauthenticated { failed: true });
	}

	fn transition(&mut self, next: SessionState) {
		debug!(target = "stockwatch.session", from = %self.state, to = %next, "session state");
		self.state = next;
		self.history.push(next);
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::time::Instant;

	use super::*;
	use crate::testing::{FakeDriver, ScriptedPrompt, seed_live_cookie, session_manager};

	#[tokio::test(start_paused = true)]
	async fn live_stored_cookie_short_circuits() {
		let dir = tempfile::tempdir().unwrap();
		seed_live_cookie(dir.path());
		let driver = Arc::new(FakeDriver::logged_in());
		let prompt = Arc::new(ScriptedPrompt::new(&[]));
		let mut manager = session_manager(driver.clone(), prompt.clone(), dir.path());

		let outcome = manager.ensure_authenticated(&CancellationToken::new()).await.unwrap();
		assert_eq!(outcome, AuthOutcome::AlreadyValid);
		assert!(manager.history().is_empty());
		assert_eq!(manager.state(), SessionState::Persisted);
		assert_eq!(driver.installed_cookies().len(), 1);
		assert!(prompt.questions().is_empty());

		let again = manager.ensure_authenticated(&CancellationToken::new()).await.unwrap();
		assert_eq!(again, AuthOutcome::AlreadyValid);
		assert!(manager.history().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn expired_only_store_counts_as_empty() {
		let dir = tempfile::tempdir().unwrap();
		CookieStore::in_dir(dir.path())
			.save(&[Cookie::new("sid", "old", ".shop.example").with_expires(1_000.0)])
			.unwrap();
		let driver = Arc::new(FakeDriver::logged_in());
		let mut manager = session_manager(driver.clone(), Arc::new(ScriptedPrompt::new(&[])), dir.path());

		let start = Instant::now();
		let outcome = manager.ensure_authenticated(&CancellationToken::new()).await.unwrap();
		assert_eq!(outcome, AuthOutcome::Authenticated);
		assert_eq!(
			manager.history(),
			&[SessionState::Detecting, SessionState::StorageWait, SessionState::Verifying, SessionState::Persisted]
		);
		assert_eq!(driver.count_calls("set_cookies"), 0);
		assert!(start.elapsed() >= Duration::from_secs(90));

		let stored = CookieStore::in_dir(dir.path()).load().unwrap();
		assert_eq!(stored[0].value, "fresh");
	}

	#[tokio::test(start_paused = true)]
	async fn empty_store_enters_detecting_and_any_signal_suffices() {
		let dir = tempfile::tempdir().unwrap();
		let driver = Arc::new(FakeDriver::new());
		driver.script_signal(AuthSignal::UiIndicator, &[false], true);
		driver.script_signal(AuthSignal::StorageToken, &[], true);
		let mut manager = session_manager(driver.clone(), Arc::new(ScriptedPrompt::new(&[])), dir.path());

		manager.ensure_authenticated(&CancellationToken::new()).await.unwrap();
		assert_eq!(manager.history()[0], SessionState::Detecting);
		assert_eq!(driver.count_calls("probe:gated_content"), 0);
		assert_eq!(driver.count_calls("load_product"), 0);
		assert!(manager.session().is_some_and(|s| s.valid));
	}

	#[tokio::test(start_paused = true)]
	async fn manual_prompt_comes_once_after_detection_cap() {
		let dir = tempfile::tempdir().unwrap();
		let driver = Arc::new(FakeDriver::new());
		driver.script_signal(AuthSignal::UiIndicator, &[false; 10], true);
		let prompt = Arc::new(ScriptedPrompt::new(&["y"]));
		let mut manager = session_manager(driver.clone(), prompt.clone(), dir.path());

		let start = Instant::now();
		let outcome = manager.ensure_authenticated(&CancellationToken::new()).await.unwrap();
		assert_eq!(outcome, AuthOutcome::Authenticated);

		let asked = prompt.asked_at();
		assert_eq!(asked.len(), 1);
		let waited = asked[0] - start;
		assert!(waited >= Duration::from_secs(600), "prompted after {waited:?}");
		assert!(waited <= Duration::from_secs(660), "prompted after {waited:?}");
		assert_eq!(prompt.questions()[0], LOGIN_QUESTION);
		assert_eq!(driver.count_calls("probe:ui_indicator"), 11);
	}

	#[tokio::test(start_paused = true)]
	async fn two_declines_are_fatal() {
		let dir = tempfile::tempdir().unwrap();
		let driver = Arc::new(FakeDriver::new());
		let prompt = Arc::new(ScriptedPrompt::new(&["n"]));
		let mut manager = session_manager(driver.clone(), prompt.clone(), dir.path());

		let err = manager.ensure_authenticated(&CancellationToken::new()).await.unwrap_err();
		assert!(matches!(err, SessionError::AuthTimeout { attempts: 20, declines: 2 }));
		assert!(err.is_fatal());
		assert_eq!(manager.state(), SessionState::Unauthenticated { failed: true });
		assert_eq!(prompt.questions().len(), 2);
		assert_eq!(driver.count_calls("navigate"), 1);
		assert!(!CookieStore::in_dir(dir.path()).path().exists());
	}

	#[tokio::test(start_paused = true)]
	async fn failed_verification_does_not_loop() {
		let dir = tempfile::tempdir().unwrap();
		let driver = Arc::new(FakeDriver::new());
		driver.script_signal(AuthSignal::GatedContent, &[], true);
		let mut manager = session_manager(driver.clone(), Arc::new(ScriptedPrompt::new(&[])), dir.path());

		let err = manager.ensure_authenticated(&CancellationToken::new()).await.unwrap_err();
		assert!(matches!(err, SessionError::VerificationFailed));
		assert!(!err.is_fatal());
		assert_eq!(manager.state(), SessionState::Unauthenticated { failed: true });
		assert!(manager.session().is_none());
		assert!(!CookieStore::in_dir(dir.path()).path().exists());
	}

	#[tokio::test(start_paused = true)]
	async fn failed_liveness_restarts_the_state_machine() {
		let dir = tempfile::tempdir().unwrap();
		seed_live_cookie(dir.path());
		let driver = Arc::new(FakeDriver::new());
		driver.script_signal(AuthSignal::UiIndicator, &[true, false], true);
		let mut manager = session_manager(driver.clone(), Arc::new(ScriptedPrompt::new(&[])), dir.path());
		let cancel = CancellationToken::new();

		assert_eq!(manager.ensure_authenticated(&cancel).await.unwrap(), AuthOutcome::AlreadyValid);
		assert_eq!(manager.ensure_authenticated(&cancel).await.unwrap(), AuthOutcome::Authenticated);
		assert_eq!(
			manager.history(),
			&[
				SessionState::Unauthenticated { failed: false },
				SessionState::Detecting,
				SessionState::StorageWait,
				SessionState::Verifying,
				SessionState::Persisted,
			]
		);
		let stored = CookieStore::in_dir(dir.path()).load().unwrap();
		assert_eq!(stored[0].value, "fresh");
	}

	#[tokio::test(start_paused = true)]
	async fn interrupt_aborts_detection_and_leaves_store_alone() {
		let dir = tempfile::tempdir().unwrap();
		let driver = Arc::new(FakeDriver::new());
		let mut manager = session_manager(driver, Arc::new(ScriptedPrompt::silent()), dir.path());
		let cancel = CancellationToken::new();
		let trigger = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(30)).await;
			trigger.cancel();
		});

		let err = manager.ensure_authenticated(&cancel).await.unwrap_err();
		assert!(matches!(err, SessionError::Interrupted));
		assert!(!CookieStore::in_dir(dir.path()).path().exists());
	}
}
