use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use authgate::config::Config;

/// Run an auth server.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Cli {
	/// Path to the filter config.
	#[arg(
		short,
		long,
		value_name = "file",
		default_value = "/etc/authgate/config.json"
	)]
	filter_config: PathBuf,

	/// Validate the configuration and exit.
	#[arg(long)]
	validate_only: bool,
}

pub fn run() -> anyhow::Result<()> {
	let args = Cli::parse();
	let config = Config::load(&args.filter_config)?;

	tracing_subscriber::fmt()
		.with_max_level(config.log_level()?)
		.init();

	if args.validate_only {
		info!("configuration is valid");
		return Ok(());
	}

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.worker_threads(config.threads)
		.enable_all()
		.build()?;
	runtime.block_on(authgate::service::run(config))
}
