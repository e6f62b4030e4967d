//! Wires configuration, browser, channels and the retry controller together.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use stockwatch_runtime::{ChromeDriver, ChromeOptions, PageDriver};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::{FileConfig, NotificationCredentials, WatchParameters, validate_target_url};
use crate::error::WatchError;
use crate::notify::telegram::TelegramChannel;
use crate::notify::{NotificationChannel, NotificationDispatcher, Prompt, TerminalChannel, TerminalPrompt, parse_yes_no};
use crate::retry::{Exit, RetryController, RunSummary};
use crate::session::SessionManager;
use crate::status::StatusReporter;
use crate::store::{CookieStore, StatusFile};
use crate::watch::WatchOutcome;

const DEFAULT_LOCATION: &str = "Home";
const DEFAULT_INTERVAL_SECS: u64 = 30;

pub async fn run(cli: Cli) -> Result<RunSummary> {
	let file = FileConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
	let state_dir = state_dir(&cli)?;
	std::fs::create_dir_all(&state_dir).with_context(|| format!("failed to create state directory {}", state_dir.display()))?;

	let prompt = Arc::new(TerminalPrompt::spawn());
	let parameters = resolve_parameters(&cli, prompt.as_ref()).await?;
	info!(
		target = "stockwatch",
		url = %parameters.target_url,
		location = %parameters.location_label,
		interval = parameters.check_interval_seconds,
		telegram = parameters.notification_credentials.is_some(),
		"watch configured"
	);

	let mut poll_policy = file.poll_policy();
	if let Some(threshold) = cli.threshold {
		poll_policy.match_threshold = threshold;
	}

	let driver = ChromeDriver::start(ChromeOptions {
		cdp_endpoint: cli.cdp_endpoint.clone(),
		executable: cli.chrome_path.clone(),
		user_data_dir: state_dir.join("browser-profile"),
		headless: cli.headless,
		port: None,
		selectors: file.selectors.clone(),
		timing: file.driver_timing(),
	})
	.await
	.context("failed to start the browser")?;
	let driver: Arc<dyn PageDriver> = Arc::new(driver);

	let cancel = CancellationToken::new();
	let dispatcher = dispatcher(&parameters, cli.no_buttons, prompt.clone(), &cancel)?;
	let session = SessionManager::new(
		driver.clone(),
		CookieStore::in_dir(&state_dir),
		prompt,
		file.session_policy(),
		parameters.origin(),
	);
	let status = StatusReporter::new(StatusFile::in_dir(&state_dir), parameters.target_url.clone());

	let interrupt = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!(target = "stockwatch", "interrupt received, shutting down");
			interrupt.cancel();
		}
	});

	let summary = RetryController::new(parameters, driver, session, dispatcher, status)
		.with_poll_policy(poll_policy)
		.with_retry_pause(file.retry_pause())
		.ask_after_purchase(cli.ask_after_purchase)
		.with_cancellation(cancel.clone())
		.run()
		.await;
	cancel.cancel();
	Ok(summary?)
}

fn state_dir(cli: &Cli) -> Result<PathBuf> {
	if let Some(dir) = &cli.state_dir {
		return Ok(dir.clone());
	}
	dirs::data_local_dir()
		.map(|dir| dir.join("stockwatch"))
		.context("no data directory on this platform; pass --state-dir")
}

fn dispatcher(
	parameters: &WatchParameters,
	no_buttons: bool,
	prompt: Arc<TerminalPrompt>,
	cancel: &CancellationToken,
) -> Result<NotificationDispatcher, WatchError> {
	let Some(credentials) = &parameters.notification_credentials else {
		info!(target = "stockwatch.notify", "no Telegram credentials, notifying in the terminal");
		let channel: Arc<dyn NotificationChannel> = Arc::new(TerminalChannel);
		return Ok(NotificationDispatcher::new(channel, prompt));
	};

	let telegram = TelegramChannel::new(credentials)?;
	let inbox = (!no_buttons).then(|| telegram.spawn_receiver(cancel.clone()));
	let dispatcher = NotificationDispatcher::new(Arc::new(telegram), prompt);
	Ok(match inbox {
		Some(inbox) => dispatcher.with_inbox(inbox),
		None => dispatcher,
	})
}

/// Builds the parameter snapshot, asking for whatever the flags left out.
pub async fn resolve_parameters(cli: &Cli, prompt: &dyn Prompt) -> Result<WatchParameters, WatchError> {
	let raw_url = match &cli.url {
		Some(url) => url.clone(),
		None => prompt
			.ask("Product page URL:")
			.await?
			.filter(|answer| !answer.trim().is_empty())
			.ok_or_else(|| WatchError::Config("a product URL is required".into()))?,
	};
	let target_url = validate_target_url(&raw_url)?;

	let location_label = match &cli.location {
		Some(location) => location.trim().to_string(),
		None => ask_or_default(prompt, &format!("Delivery location label [{DEFAULT_LOCATION}]:"), DEFAULT_LOCATION).await?,
	};

	let check_interval_seconds = match cli.interval {
		Some(secs) => secs,
		None => {
			let answer = ask_or_default(prompt, &format!("Seconds between checks [{DEFAULT_INTERVAL_SECS}]:"), &DEFAULT_INTERVAL_SECS.to_string()).await?;
			answer
				.parse::<u64>()
				.ok()
				.filter(|secs| *secs > 0)
				.ok_or_else(|| WatchError::Config(format!("check interval must be a positive number of seconds, got '{answer}'")))?
		}
	};

	let continue_on_out_of_stock = match cli.continue_on_out_of_stock {
		Some(keep) => keep,
		None => parse_yes_no(prompt.ask("Keep watching while out of stock? [y/N]").await?.as_deref()),
	};

	Ok(WatchParameters {
		target_url,
		target_product_label: cli.product.as_deref().map(str::trim).unwrap_or_default().to_string(),
		location_label,
		check_interval_seconds,
		continue_on_out_of_stock,
		notification_credentials: NotificationCredentials::from_parts(cli.telegram_bot_token.clone(), cli.telegram_channel_id.clone()),
	})
}

async fn ask_or_default(prompt: &dyn Prompt, question: &str, default: &str) -> Result<String, WatchError> {
	let answer = prompt.ask(question).await?.unwrap_or_default();
	let answer = answer.trim();
	Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

pub fn print_summary(summary: &RunSummary) {
	let last = summary.cycles.last().map(|cycle| &cycle.outcome);
	match (summary.exit, last) {
		(Exit::Purchased, Some(WatchOutcome::Purchased(verified))) => println!(
			"{} {} after {} check(s), {} restart(s)",
			"In cart:".green().bold(),
			verified.product_name.cyan().bold(),
			verified.check,
			summary.attempts
		),
		_ => println!(
			"{} after {} cycle(s)",
			"Monitoring stopped".yellow().bold(),
			summary.cycles.len()
		),
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;
	use crate::testing::ScriptedPrompt;

	#[tokio::test]
	async fn missing_values_are_prompted_with_defaults() {
		let cli = Cli::parse_from(["stockwatch"]);
		let prompt = ScriptedPrompt::new(&["https://shop.example/prn/widget/prid/7", "", "", ""]);

		let params = resolve_parameters(&cli, &prompt).await.unwrap();
		assert_eq!(params.target_url, "https://shop.example/prn/widget/prid/7");
		assert_eq!(params.location_label, "Home");
		assert_eq!(params.check_interval_seconds, 30);
		assert!(!params.continue_on_out_of_stock);
		assert!(params.target_product_label.is_empty());
		assert_eq!(prompt.questions().len(), 4);
	}

	#[tokio::test]
	async fn flags_skip_the_prompts() {
		let cli = Cli::parse_from([
			"stockwatch",
			"--url",
			"https://shop.example/p/1",
			"--location",
			"Office",
			"--interval",
			"90",
			"--continue-on-out-of-stock",
			"--product",
			" Widget Deluxe ",
		]);
		let prompt = ScriptedPrompt::new(&[]);

		let params = resolve_parameters(&cli, &prompt).await.unwrap();
		assert_eq!(params.location_label, "Office");
		assert_eq!(params.check_interval_seconds, 90);
		assert!(params.continue_on_out_of_stock);
		assert_eq!(params.target_product_label, "Widget Deluxe");
		assert!(prompt.questions().is_empty());
	}

	#[tokio::test]
	async fn bad_answers_are_configuration_errors() {
		let cli = Cli::parse_from(["stockwatch"]);
		assert!(matches!(resolve_parameters(&cli, &ScriptedPrompt::new(&[])).await, Err(WatchError::Config(_))));

		let prompt = ScriptedPrompt::new(&["https://shop.example/p/1", "Home", "soon"]);
		assert!(matches!(resolve_parameters(&cli, &prompt).await, Err(WatchError::Config(_))));
	}
}
