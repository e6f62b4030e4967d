//! HTTP calls to the Telegram Bot API.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use stockwatch_protocol::ActionButton;
use tracing::{debug, warn};

use super::types::{ApiResponse, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, SentMessage, Update};
use crate::error::NotifyError;

const API_BASE: &str = "https://api.telegram.org";

/// Bot API client bound to one bot token.
pub struct TelegramApi {
	client: Client,
	base_url: String,
}

impl TelegramApi {
	pub fn new(bot_token: &str) -> Result<Self, NotifyError> {
		Self::with_base_url(bot_token, API_BASE)
	}

	pub fn with_base_url(bot_token: &str, base_url: &str) -> Result<Self, NotifyError> {
		// Long polls hold the request open for up to the poll timeout.
		let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
		Ok(Self {
			client,
			base_url: format!("{}/bot{}", base_url.trim_end_matches('/'), bot_token),
		})
	}

	async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, NotifyError> {
		let resp: ApiResponse<T> = self
			.client
			.post(format!("{}/{method}", self.base_url))
			.json(body)
			.send()
			.await?
			.json()
			.await?;

		if !resp.ok {
			let desc = resp.description.unwrap_or_default();
			return Err(NotifyError::Api(format!("{method}: {desc}")));
		}
		resp.result.ok_or_else(|| NotifyError::Api(format!("{method}: empty result")))
	}

	/// Sends an HTML message and returns its id.
	pub async fn send_message(&self, chat_id: &ChatId, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> Result<i64, NotifyError> {
		let mut body = json!({
			"chat_id": chat_id,
			"text": text,
			"parse_mode": "HTML",
			"disable_web_page_preview": true,
		});
		if let Some(markup) = keyboard {
			body["reply_markup"] = serde_json::to_value(markup)?;
		}

		debug!(target = "stockwatch.notify", ?chat_id, "sendMessage");
		let sent: SentMessage = self.call("sendMessage", &body).await?;
		Ok(sent.message_id)
	}

	/// Long-polls for button presses after `offset`.
	pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, NotifyError> {
		let mut body = json!({
			"timeout": timeout_secs,
			"allowed_updates": ["callback_query"],
		});
		if let Some(off) = offset {
			body["offset"] = json!(off);
		}
		self.call("getUpdates", &body).await
	}

	/// Dismisses the client-side spinner on a pressed button.
	pub async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>) -> Result<(), NotifyError> {
		let mut body = json!({ "callback_query_id": callback_query_id });
		if let Some(t) = text {
			body["text"] = json!(t);
		}
		let _: bool = self.call("answerCallbackQuery", &body).await?;
		Ok(())
	}

	/// Removes the keyboard from a message so it cannot be pressed twice.
	pub async fn remove_reply_markup(&self, chat_id: i64, message_id: i64) {
		let body = json!({
			"chat_id": chat_id,
			"message_id": message_id,
			"reply_markup": { "inline_keyboard": [] },
		});
		if let Err(e) = self.call::<Value>("editMessageReplyMarkup", &body).await {
			warn!(target = "stockwatch.notify", message_id, error = %e, "failed to remove buttons");
		}
	}
}

/// One-row inline keyboard, in button order.
pub fn build_keyboard(buttons: &[ActionButton]) -> Option<InlineKeyboardMarkup> {
	if buttons.is_empty() {
		return None;
	}
	let row = buttons
		.iter()
		.map(|b| InlineKeyboardButton {
			text: b.label.clone(),
			callback_data: b.action_token.clone(),
		})
		.collect();
	Some(InlineKeyboardMarkup { inline_keyboard: vec![row] })
}
