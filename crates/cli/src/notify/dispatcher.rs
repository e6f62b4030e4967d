//! Formats and sends watch notifications, and resolves the operator's
//! restart decision from whichever answer arrives first.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stockwatch_protocol::{ActionButton, ButtonAction, NotificationPayload};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{NotificationChannel, Prompt, escape_html, parse_yes_no};
use crate::config::WatchParameters;
use crate::error::{Cancelled, WatchError};
use crate::pace;
use crate::watch::VerifiedAvailability;

pub const RETRY_QUESTION: &str = "Restart monitoring with the same settings? [y/N]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
	Restart,
	Stop,
}

impl RetryDecision {
	pub fn is_restart(self) -> bool {
		self == Self::Restart
	}
}

impl From<bool> for RetryDecision {
	fn from(restart: bool) -> Self {
		if restart { Self::Restart } else { Self::Stop }
	}
}

pub struct NotificationDispatcher {
	channel: Arc<dyn NotificationChannel>,
	prompt: Arc<dyn Prompt>,
	inbox: Option<tokio::sync::Mutex<mpsc::Receiver<String>>>,
	buttons: Vec<ActionButton>,
	notified: parking_lot::Mutex<HashMap<(u32, u64), bool>>,
	offered: parking_lot::Mutex<HashSet<String>>,
}

impl NotificationDispatcher {
	pub fn new(channel: Arc<dyn NotificationChannel>, prompt: Arc<dyn Prompt>) -> Self {
		Self {
			channel,
			prompt,
			inbox: None,
			buttons: NotificationPayload::default().with_default_buttons().buttons,
			notified: parking_lot::Mutex::new(HashMap::new()),
			offered: parking_lot::Mutex::new(HashSet::new()),
		}
	}

	/// Wires an inbound action-token stream into [`resolve_retry_decision`](Self::resolve_retry_decision).
	pub fn with_inbox(mut self, inbox: mpsc::Receiver<String>) -> Self {
		self.inbox = Some(tokio::sync::Mutex::new(inbox));
		self
	}

	/// Replaces the button set attached to availability messages.
	pub fn with_buttons(mut self, buttons: Vec<ActionButton>) -> Self {
		self.buttons = buttons;
		self
	}

	pub fn channel_name(&self) -> &'static str {
		self.channel.name()
	}

	/// Announces a verified availability. Sends at most once per event;
	/// repeated calls return the first delivery result.
	pub async fn notify_available(&self, event: &VerifiedAvailability, params: &WatchParameters) -> bool {
		if let Some(delivered) = self.notified.lock().get(&event.event_key()) {
			debug!(target = "stockwatch.notify", cycle = event.cycle, check = event.check, "already notified for this event");
			return *delivered;
		}

		let mut payload = NotificationPayload::text(available_text(event, params)).with_alert();
		if self.channel.supports_buttons() {
			for button in &self.buttons {
				payload = payload.with_button(button.label.clone(), button.action_token.clone());
			}
		}

		let delivered = match self.channel.send(&payload).await {
			Ok(receipt) => {
				self.offered.lock().extend(payload.buttons.iter().map(|b| b.action_token.clone()));
				info!(target = "stockwatch.notify", channel = self.channel.name(), message_id = ?receipt.message_id, "availability notification sent");
				true
			}
			Err(e) => {
				warn!(target = "stockwatch.notify", channel = self.channel.name(), error = %e, "availability notification failed");
				false
			}
		};
		self.notified.lock().insert(event.event_key(), delivered);
		delivered
	}

	/// Tells the operator a cycle ended without a purchase. No buttons.
	pub async fn notify_stopped(&self, params: &WatchParameters, reason: &str) -> bool {
		let payload = NotificationPayload::text(stopped_text(params, reason));
		match self.channel.send(&payload).await {
			Ok(_) => true,
			Err(e) => {
				warn!(target = "stockwatch.notify", channel = self.channel.name(), error = %e, "stop notification failed");
				false
			}
		}
	}

	/// Waits for a button token or a terminal answer, whichever comes first.
	pub async fn resolve_retry_decision(&self, cancel: &CancellationToken) -> Result<RetryDecision, WatchError> {
		let Some(inbox) = &self.inbox else {
			let answer = pace::guard(cancel, self.prompt.ask(RETRY_QUESTION)).await??;
			return Ok(parse_yes_no(answer.as_deref()).into());
		};

		let mut inbox = inbox.lock().await;
		let mut prompt = self.prompt.ask(RETRY_QUESTION);
		let mut inbox_open = true;

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Cancelled.into()),
				answer = &mut prompt => {
					let answer = answer?;
					return Ok(parse_yes_no(answer.as_deref()).into());
				}
				token = inbox.recv(), if inbox_open => match token {
					Some(token) => {
						if let Some(decision) = self.decision_for_token(&token) {
							self.prompt.abandon();
							info!(target = "stockwatch.notify", ?decision, "retry decision received from button");
							return Ok(decision);
						}
					}
					None => inbox_open = false,
				},
			}
		}
	}

	fn decision_for_token(&self, token: &str) -> Option<RetryDecision> {
		if !self.offered.lock().contains(token) {
			debug!(target = "stockwatch.notify", token, "ignoring token that was never offered");
			return None;
		}
		match ButtonAction::from_token(token)? {
			ButtonAction::Retry => Some(RetryDecision::Restart),
			ButtonAction::Cancel => Some(RetryDecision::Stop),
		}
	}
}

fn display_label<'a>(params: &'a WatchParameters, observed: &'a str) -> &'a str {
	if params.target_product_label.trim().is_empty() {
		observed
	} else {
		&params.target_product_label
	}
}

fn available_text(event: &VerifiedAvailability, params: &WatchParameters) -> String {
	format!(
		"<b>Product available and added to cart</b>\n\
		 Product: <b>{}</b>\n\
		 Location: {}\n\
		 Match: {:.0}% (cart {:.0}%)\n\
		 <a href=\"{}\">Open product page</a>",
		escape_html(display_label(params, &event.product_name)),
		escape_html(&params.location_label),
		event.similarity * 100.0,
		event.cart_similarity * 100.0,
		escape_html(&params.target_url),
	)
}

fn stopped_text(params: &WatchParameters, reason: &str) -> String {
	format!(
		"<b>Monitoring stopped</b>\n\
		 Product: {}\n\
		 Reason: {}\n\
		 Answer the prompt in the terminal to restart.",
		escape_html(display_label(params, &params.target_url)),
		escape_html(reason),
	)
}
