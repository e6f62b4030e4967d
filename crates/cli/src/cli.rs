use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "stockwatch")]
#[command(about = "Watch a product page until it can be bought, verify it, and notify")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Product page to watch (prompted for when missing)
	#[arg(long, value_name = "URL")]
	pub url: Option<String>,

	/// Expected product name; defaults to the name shown on the first load
	#[arg(long, value_name = "NAME")]
	pub product: Option<String>,

	/// Saved delivery location to select (prompted for when missing)
	#[arg(long, value_name = "LABEL")]
	pub location: Option<String>,

	/// Seconds between checks (prompted for when missing)
	#[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
	pub interval: Option<u64>,

	/// Keep watching while the product is out of stock (prompted for when missing)
	#[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
	pub continue_on_out_of_stock: Option<bool>,

	/// Name similarity required at both verification gates (0.0-1.0)
	#[arg(long, value_name = "SCORE", value_parser = parse_threshold)]
	pub threshold: Option<f64>,

	/// Directory for cookies.json, status.json and the browser profile
	#[arg(long, value_name = "DIR", env = "STOCKWATCH_STATE_DIR")]
	pub state_dir: Option<PathBuf>,

	/// Policy config file (defaults to <config dir>/stockwatch/config.json)
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Launch the browser without a window
	#[arg(long)]
	pub headless: bool,

	/// Attach to a running browser instead of launching one
	#[arg(long, value_name = "URL")]
	pub cdp_endpoint: Option<String>,

	/// Browser executable to launch
	#[arg(long, value_name = "PATH")]
	pub chrome_path: Option<PathBuf>,

	/// Ask whether to restart after a successful purchase too
	#[arg(long)]
	pub ask_after_purchase: bool,

	/// Do not listen for Telegram button presses
	#[arg(long)]
	pub no_buttons: bool,

	#[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true, hide = true)]
	pub telegram_bot_token: Option<String>,

	#[arg(long, env = "TELEGRAM_CHANNEL_ID", hide = true)]
	pub telegram_channel_id: Option<String>,
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
	let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
	if (0.0..=1.0).contains(&value) {
		Ok(value)
	} else {
		Err(format!("{value} is outside 0.0..=1.0"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn out_of_stock_flag_is_tristate() {
		let cli = Cli::parse_from(["stockwatch"]);
		assert_eq!(cli.continue_on_out_of_stock, None);
		let cli = Cli::parse_from(["stockwatch", "--continue-on-out-of-stock"]);
		assert_eq!(cli.continue_on_out_of_stock, Some(true));
		let cli = Cli::parse_from(["stockwatch", "--continue-on-out-of-stock", "false"]);
		assert_eq!(cli.continue_on_out_of_stock, Some(false));
	}

	#[test]
	fn threshold_and_interval_are_range_checked() {
		assert!(Cli::try_parse_from(["stockwatch", "--threshold", "1.2"]).is_err());
		assert!(Cli::try_parse_from(["stockwatch", "--interval", "0"]).is_err());
		let cli = Cli::try_parse_from(["stockwatch", "--threshold", "0.85", "--interval", "45", "-vv"]).unwrap();
		assert_eq!(cli.threshold, Some(0.85));
		assert_eq!(cli.interval, Some(45));
		assert_eq!(cli.verbose, 2);
	}
}
