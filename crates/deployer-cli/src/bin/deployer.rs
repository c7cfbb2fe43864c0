//! Main binary entry point for the contract deployer.
//!
//! Parses arguments, sets up logging and dispatches to the command handlers.
//! The process exits non-zero when a deployment halts.

use anyhow::Result;
use clap::Parser;
use deployer_cli::{cli::Cli, CommandHandler, Context};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
	// Load environment variables from .env file if it exists
	let _ = dotenvy::dotenv();

	let cli = Cli::parse();
	init_logging(cli.verbose);

	let ctx = Context::load(&cli.config).await?;
	CommandHandler::new(ctx).handle(cli.command).await
}

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence; otherwise deployer crates log at info, or
/// debug with `--verbose`, and everything else at warn.
fn init_logging(verbose: bool) {
	use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

	let default_filter = if verbose {
		"deployer=debug,warn"
	} else {
		"deployer=info,warn"
	};
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::registry()
		.with(
			fmt::layer()
				.with_target(verbose)
				.with_thread_ids(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.with(env_filter)
		.init();
}
