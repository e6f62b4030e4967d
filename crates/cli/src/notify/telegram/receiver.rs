//! `getUpdates` long-poll receiver for inline button presses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stockwatch_protocol::ButtonAction;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::TelegramApi;
use super::types::CallbackQuery;

const POLL_TIMEOUT_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 60;

/// Ids of messages this process sent with buttons.
pub type SentMessages = Arc<Mutex<HashSet<i64>>>;

/// A press this process should act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedPress {
	pub action: ButtonAction,
	pub chat_id: i64,
	pub message_id: i64,
}

/// Accepts presses on our own messages that carry a known action token.
pub fn accept_callback(cb: &CallbackQuery, sent: &HashSet<i64>) -> Option<AcceptedPress> {
	let message = cb.message.as_ref()?;
	if !sent.contains(&message.message_id) {
		return None;
	}
	let action = ButtonAction::from_token(cb.data.as_deref()?)?;
	Some(AcceptedPress {
		action,
		chat_id: message.chat.id,
		message_id: message.message_id,
	})
}

/// Polls until `cancel` fires or the token consumer goes away, forwarding
/// accepted action tokens.
pub async fn poll_loop(api: Arc<TelegramApi>, sent: SentMessages, tokens: mpsc::Sender<String>, cancel: CancellationToken) {
	let mut offset: Option<i64> = None;
	let mut backoff_secs = 1u64;

	info!(target = "stockwatch.notify", "button receiver started");

	loop {
		let updates = tokio::select! {
			_ = cancel.cancelled() => {
				debug!(target = "stockwatch.notify", "button receiver cancelled");
				return;
			}
			result = api.get_updates(offset, POLL_TIMEOUT_SECS) => result,
		};

		let updates = match updates {
			Ok(updates) => {
				backoff_secs = 1;
				updates
			}
			Err(e) => {
				warn!(target = "stockwatch.notify", error = %e, backoff_secs, "getUpdates failed, backing off");
				tokio::select! {
					_ = cancel.cancelled() => return,
					_ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
				}
				backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
				continue;
			}
		};

		for update in updates {
			offset = Some(update.update_id + 1);
			let Some(cb) = update.callback_query else { continue };

			let accepted = accept_callback(&cb, &sent.lock());
			let Some(press) = accepted else {
				debug!(target = "stockwatch.notify", data = ?cb.data, "ignoring unrelated callback");
				let _ = api.answer_callback_query(&cb.id, None).await;
				continue;
			};

			let ack = match press.action {
				ButtonAction::Retry => "Restarting monitoring",
				ButtonAction::Cancel => "Monitoring stays stopped",
			};
			let _ = api.answer_callback_query(&cb.id, Some(ack)).await;
			api.remove_reply_markup(press.chat_id, press.message_id).await;
			sent.lock().remove(&press.message_id);

			info!(target = "stockwatch.notify", action = ?press.action, message_id = press.message_id, "button pressed");
			if tokens.send(press.action.token().to_string()).await.is_err() {
				debug!(target = "stockwatch.notify", "token consumer gone, stopping receiver");
				return;
			}
		}
	}
}
