//! Top-level watch loop: run a cycle, report it, ask whether to go again.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stockwatch_protocol::WatchStatus;
use stockwatch_runtime::PageDriver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{PollPolicy, WatchParameters};
use crate::error::WatchError;
use crate::notify::NotificationDispatcher;
use crate::pace;
use crate::session::SessionManager;
use crate::status::StatusReporter;
use crate::watch::{AvailabilityPoller, WatchOutcome};

/// Restart counter plus the parameter snapshot every cycle starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
	/// Incremented once per accepted restart.
	pub attempt_count: u32,
	pub parameters: WatchParameters,
}

/// One finished cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
	pub attempt: u32,
	pub parameters: WatchParameters,
	pub outcome: WatchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
	/// The final cycle verified the product in the cart.
	Purchased,
	/// The operator chose not to restart.
	Declined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
	pub exit: Exit,
	pub attempts: u32,
	pub cycles: Vec<CycleReport>,
}

pub struct RetryController {
	state: RetryState,
	driver: Arc<dyn PageDriver>,
	session: SessionManager,
	dispatcher: NotificationDispatcher,
	status: StatusReporter,
	poll_policy: PollPolicy,
	retry_pause: Duration,
	ask_after_purchase: bool,
	cancel: CancellationToken,
}

impl RetryController {
	pub fn new(
		parameters: WatchParameters,
		driver: Arc<dyn PageDriver>,
		session: SessionManager,
		dispatcher: NotificationDispatcher,
		status: StatusReporter,
	) -> Self {
		Self {
			state: RetryState {
				attempt_count: 0,
				parameters,
			},
			driver,
			session,
			dispatcher,
			status,
			poll_policy: PollPolicy::default(),
			retry_pause: Duration::from_secs(5),
			ask_after_purchase: false,
			cancel: CancellationToken::new(),
		}
	}

	pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
		self.poll_policy = policy;
		self
	}

	pub fn with_retry_pause(mut self, pause: Duration) -> Self {
		self.retry_pause = pause;
		self
	}

	/// Also ask for a restart after a successful cycle.
	pub fn ask_after_purchase(mut self, ask: bool) -> Self {
		self.ask_after_purchase = ask;
		self
	}

	/// Shares `cancel` with the rest of the process.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}

	/// Token that interrupts every wait of the run when cancelled.
	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	pub fn state(&self) -> &RetryState {
		&self.state
	}

	/// Runs cycles until a purchase or a declined restart. The browser is
	/// closed on every exit path.
	pub async fn run(mut self) -> Result<RunSummary, WatchError> {
		let result = self.run_cycles().await;
		if let Err(e) = self.driver.close().await {
			debug!(target = "stockwatch.retry", error = %e, "closing the browser failed");
		}
		result
	}

	async fn run_cycles(&mut self) -> Result<RunSummary, WatchError> {
		let mut cycles = Vec::new();
		loop {
			let attempt = self.state.attempt_count;
			if attempt > 0 {
				info!(target = "stockwatch.retry", "RETRY #{attempt}");
			}

			let parameters = self.state.parameters.clone();
			let poller = AvailabilityPoller::new(self.driver.as_ref(), &self.status, &parameters, self.poll_policy, attempt);
			let outcome = poller.run(&mut self.session, &self.cancel).await?;

			match &outcome {
				WatchOutcome::Purchased(verified) => {
					self.dispatcher.notify_available(verified, &parameters).await;
					self.status.report(
						WatchStatus::Purchased,
						verified.check,
						[("product_name", json!(verified.product_name)), ("attempt", json!(attempt))],
					);
				}
				WatchOutcome::StoppedByUser(reason) => {
					self.dispatcher.notify_stopped(&parameters, reason.describe()).await;
				}
				WatchOutcome::Error(reason) => {
					self.dispatcher.notify_stopped(&parameters, reason).await;
				}
			}

			let purchased = outcome.is_purchased();
			info!(target = "stockwatch.retry", attempt, purchased, "cycle finished");
			cycles.push(CycleReport {
				attempt,
				parameters,
				outcome,
			});

			if purchased && !self.ask_after_purchase {
				return Ok(self.summary(Exit::Purchased, cycles));
			}

			let decision = self.dispatcher.resolve_retry_decision(&self.cancel).await?;
			if !decision.is_restart() {
				info!(target = "stockwatch.retry", "operator declined to restart");
				let exit = if purchased { Exit::Purchased } else { Exit::Declined };
				return Ok(self.summary(exit, cycles));
			}

			self.state.attempt_count += 1;
			pace::sleep(&self.cancel, self.retry_pause).await?;
		}
	}

	fn summary(&self, exit: Exit, cycles: Vec<CycleReport>) -> RunSummary {
		RunSummary {
			exit,
			attempts: self.state.attempt_count,
			cycles,
		}
	}
}
