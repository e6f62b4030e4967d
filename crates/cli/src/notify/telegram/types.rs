//! Serde types for the subset of the Telegram Bot API in use.

use serde::{Deserialize, Serialize};

/// Response envelope shared by every method.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
	pub ok: bool,
	pub description: Option<String>,
	pub result: Option<T>,
}

/// Target chat: a numeric id or an `@channel` username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatId {
	Id(i64),
	Username(String),
}

impl ChatId {
	pub fn parse(raw: &str) -> Self {
		let raw = raw.trim();
		match raw.parse::<i64>() {
			Ok(id) => Self::Id(id),
			Err(_) if raw.starts_with('@') => Self::Username(raw.to_string()),
			Err(_) => Self::Username(format!("@{raw}")),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Update {
	pub update_id: i64,
	pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
	pub message_id: i64,
	pub chat: Chat,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
	pub id: i64,
}

/// Inline keyboard button press.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
	pub id: String,
	pub message: Option<Message>,
	pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
	pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
	pub text: String,
	pub callback_data: String,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
	pub message_id: i64,
}
