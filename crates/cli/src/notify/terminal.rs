//! Terminal-side channel and prompt.

use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use colored::Colorize;
use stockwatch_protocol::NotificationPayload;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use super::{Delivered, NotificationChannel, Prompt, strip_html};
use crate::error::NotifyError;

/// Line-oriented prompt over stdin.
///
/// One reader thread owns stdin for the whole process and feeds lines into a
/// channel, so an abandoned `ask` (lost race, cancellation) never strands a
/// half-read line or a blocked thread. On an interactive terminal, lines typed
/// while no question was pending are dropped before the next question.
pub struct TerminalPrompt {
	lines: Mutex<mpsc::UnboundedReceiver<String>>,
	discard_stale: bool,
}

impl TerminalPrompt {
	pub fn spawn() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		std::thread::Builder::new()
			.name("stockwatch-stdin".into())
			.spawn(move || {
				let stdin = std::io::stdin();
				for line in stdin.lock().lines() {
					let Ok(line) = line else { break };
					if tx.send(line).is_err() {
						break;
					}
				}
				debug!(target = "stockwatch.notify", "stdin closed");
			})
			.map(|_| ())
			.unwrap_or_else(|e| debug!(target = "stockwatch.notify", error = %e, "failed to spawn stdin reader"));
		Self::from_lines(rx, std::io::stdin().is_terminal())
	}

	fn from_lines(lines: mpsc::UnboundedReceiver<String>, discard_stale: bool) -> Self {
		Self {
			lines: Mutex::new(lines),
			discard_stale,
		}
	}
}

#[async_trait]
impl Prompt for TerminalPrompt {
	async fn ask(&self, question: &str) -> Result<Option<String>, NotifyError> {
		let mut lines = self.lines.lock().await;
		if self.discard_stale {
			let mut dropped = 0usize;
			while lines.try_recv().is_ok() {
				dropped += 1;
			}
			if dropped > 0 {
				debug!(target = "stockwatch.notify", dropped, "discarding input typed before the question");
			}
		}
		{
			let mut stdout = std::io::stdout().lock();
			write!(stdout, "{} ", question.bold()).map_err(|e| NotifyError::Prompt(e.to_string()))?;
			stdout.flush().map_err(|e| NotifyError::Prompt(e.to_string()))?;
		}
		Ok(lines.recv().await)
	}

	fn abandon(&self) {
		println!();
	}
}

/// Prints notifications to the terminal. Used when no remote channel is set up.
#[derive(Debug, Default)]
pub struct TerminalChannel;

#[async_trait]
impl NotificationChannel for TerminalChannel {
	fn name(&self) -> &'static str {
		"terminal"
	}

	async fn send(&self, payload: &NotificationPayload) -> Result<Delivered, NotifyError> {
		let mut stdout = std::io::stdout().lock();
		let io = |e: std::io::Error| NotifyError::Prompt(e.to_string());
		stdout.write_all(render(payload).as_bytes()).map_err(io)?;
		stdout.flush().map_err(io)?;
		Ok(Delivered::default())
	}
}

/// Plain-text rendering; alerts ring the terminal bell.
fn render(payload: &NotificationPayload) -> String {
	let text = strip_html(&payload.text);
	let mut lines = text.lines();
	let mut out = String::new();
	if payload.alert {
		out.push('\x07');
	}
	if let Some(headline) = lines.next() {
		out.push_str(&format!("\n{}\n", headline.green().bold()));
	}
	for line in lines {
		out.push_str(&format!("  {line}\n"));
	}
	out
}
