use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(verbose > 1)
		.with_writer(std::io::stderr)
		.try_init();
}

fn default_directives(verbose: u8) -> &'static str {
	match verbose {
		0 => "warn,stockwatch=info",
		1 => "info,stockwatch=debug",
		_ => "debug,stockwatch=trace",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_raises_crate_level_first() {
		assert_eq!(default_directives(0), "warn,stockwatch=info");
		assert_eq!(default_directives(1), "info,stockwatch=debug");
		assert_eq!(default_directives(5), default_directives(2));
		for verbose in 0..3 {
			assert!(EnvFilter::try_new(default_directives(verbose)).is_ok());
		}
	}
}
