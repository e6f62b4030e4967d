//! Notification payloads and action tokens.

use serde::{Deserialize, Serialize};

/// Action token carried by the default "Retry" button.
pub const RETRY_TOKEN: &str = "stockwatch:retry";
/// Action token carried by the default "Cancel" button.
pub const CANCEL_TOKEN: &str = "stockwatch:cancel";

/// Operation a button press requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
	Retry,
	Cancel,
}

impl ButtonAction {
	/// Maps an action token back to its operation.
	pub fn from_token(token: &str) -> Option<Self> {
		match token {
			RETRY_TOKEN => Some(Self::Retry),
			CANCEL_TOKEN => Some(Self::Cancel),
			_ => None,
		}
	}

	pub fn token(self) -> &'static str {
		match self {
			Self::Retry => RETRY_TOKEN,
			Self::Cancel => CANCEL_TOKEN,
		}
	}
}

/// One labelled button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionButton {
	pub label: String,
	pub action_token: String,
}

/// Message text plus an ordered, label-unique set of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPayload {
	pub text: String,
	#[serde(default)]
	pub buttons: Vec<ActionButton>,
	/// Local delivery should draw attention (bell, sound). Not sent on the wire.
	#[serde(skip)]
	pub alert: bool,
}

impl NotificationPayload {
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			buttons: Vec::new(),
			alert: false,
		}
	}

	pub fn with_alert(mut self) -> Self {
		self.alert = true;
		self
	}

	/// Adds a button, replacing the token of an existing button with the same label.
	pub fn with_button(mut self, label: impl Into<String>, action_token: impl Into<String>) -> Self {
		let label = label.into();
		let action_token = action_token.into();
		match self.buttons.iter_mut().find(|b| b.label == label) {
			Some(existing) => existing.action_token = action_token,
			None => self.buttons.push(ActionButton { label, action_token }),
		}
		self
	}

	/// Attaches the default `Retry` / `Cancel` pair.
	pub fn with_default_buttons(self) -> Self {
		self.with_button("Retry", RETRY_TOKEN).with_button("Cancel", CANCEL_TOKEN)
	}

	pub fn has_buttons(&self) -> bool {
		!self.buttons.is_empty()
	}

	/// Returns `true` when `token` belongs to one of this payload's buttons.
	pub fn offers(&self, token: &str) -> bool {
		self.buttons.iter().any(|b| b.action_token == token)
	}
}
