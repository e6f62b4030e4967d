//! Telegram channel: HTML messages with inline buttons, plus a long-poll
//! receiver that turns button presses back into action tokens.

pub mod api;
pub mod receiver;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stockwatch_protocol::NotificationPayload;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use self::api::{TelegramApi, build_keyboard};
use self::receiver::SentMessages;
use self::types::ChatId;
use super::{Delivered, NotificationChannel};
use crate::config::NotificationCredentials;
use crate::error::NotifyError;

pub struct TelegramChannel {
	api: Arc<TelegramApi>,
	chat_id: ChatId,
	sent: SentMessages,
}

impl TelegramChannel {
	pub fn new(credentials: &NotificationCredentials) -> Result<Self, NotifyError> {
		Ok(Self {
			api: Arc::new(TelegramApi::new(&credentials.bot_token)?),
			chat_id: ChatId::parse(&credentials.channel_id),
			sent: Arc::new(Mutex::new(HashSet::new())),
		})
	}

	/// Starts the button receiver; tokens arrive on the returned channel.
	pub fn spawn_receiver(&self, cancel: CancellationToken) -> mpsc::Receiver<String> {
		let (tx, rx) = mpsc::channel(8);
		tokio::spawn(receiver::poll_loop(Arc::clone(&self.api), Arc::clone(&self.sent), tx, cancel));
		rx
	}
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
	fn name(&self) -> &'static str {
		"telegram"
	}

	fn supports_buttons(&self) -> bool {
		true
	}

	async fn send(&self, payload: &NotificationPayload) -> Result<Delivered, NotifyError> {
		let keyboard = build_keyboard(&payload.buttons);
		let message_id = self.api.send_message(&self.chat_id, &payload.text, keyboard).await?;
		if payload.has_buttons() {
			self.sent.lock().insert(message_id);
		}
		Ok(Delivered { message_id: Some(message_id) })
	}
}
