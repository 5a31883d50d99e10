//! Main entry point for the AGI solver service.
//!
//! Loads configuration, builds the solver via `AgiSolverBuilder`, reconstructs
//! the queue from the escrow contract's backlog, starts the live event watch,
//! and then idles until interrupted. All the actual work happens on the Queue
//! Core's background task; this binary's job is wiring and lifecycle.

use agi_config::Config;
use agi_core::AgiSolverBuilder;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the solver service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("starting AGI solver");

	let config = Config::from_file(args.config.to_str().unwrap())?;
	tracing::info!(solver_id = %config.solver.id, "loaded configuration");

	let solver = AgiSolverBuilder::new(config).build().await?;
	solver.start().await?;
	tracing::info!("solver running");

	tokio::signal::ctrl_c().await?;
	solver.queue.close();
	tracing::info!("stopping AGI solver");

	Ok(())
}
