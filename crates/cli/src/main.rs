use clap::Parser;
use stockwatch_cli::{app, cli::Cli, error::WatchError, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match app::run(cli).await {
		Ok(summary) => app::print_summary(&summary),
		Err(err) => {
			let code = err.downcast_ref::<WatchError>().map_or(1, WatchError::exit_code);
			let message = format!("{err:#}");
			error!(target = "stockwatch", error = %message, "watch failed");
			std::process::exit(code);
		}
	}
}
