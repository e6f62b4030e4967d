//! Notification channels, the terminal prompt, and the dispatcher that ties
//! them to the retry decision.

pub mod dispatcher;
pub mod telegram;
pub mod terminal;

use async_trait::async_trait;
use stockwatch_protocol::NotificationPayload;

use crate::error::NotifyError;

pub use dispatcher::{NotificationDispatcher, RetryDecision};
pub use terminal::{TerminalChannel, TerminalPrompt};

/// Delivery receipt for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivered {
	/// Channel-side id, when the channel assigns one.
	pub message_id: Option<i64>,
}

/// Outbound message sink.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
	fn name(&self) -> &'static str;

	/// Whether inline buttons can be rendered and pressed.
	fn supports_buttons(&self) -> bool {
		false
	}

	async fn send(&self, payload: &NotificationPayload) -> Result<Delivered, NotifyError>;
}

/// Synchronous operator question.
#[async_trait]
pub trait Prompt: Send + Sync {
	/// Prints `question` and waits for one line. `None` means input is closed.
	async fn ask(&self, question: &str) -> Result<Option<String>, NotifyError>;

	/// The last question was settled elsewhere and will not be answered here.
	fn abandon(&self) {}
}

/// `y`/`yes` is yes; anything else, including empty input and EOF, is no.
pub fn parse_yes_no(answer: Option<&str>) -> bool {
	matches!(answer.map(|a| a.trim().to_ascii_lowercase()).as_deref(), Some("y" | "yes"))
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(ch),
		}
	}
	out
}

/// Drops markup tags and decodes the entities [`escape_html`] produces.
pub fn strip_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut in_tag = false;
	for ch in text.chars() {
		match ch {
			'<' => in_tag = true,
			'>' if in_tag => in_tag = false,
			_ if !in_tag => out.push(ch),
			_ => {}
		}
	}
	out.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&amp;", "&")
}
