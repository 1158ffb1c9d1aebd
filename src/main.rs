#![deny(rust_2018_idioms)]

use clap::Parser;
use miette::Result;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gocrane::{
	args::{Args, Command},
	crane,
};

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let verbose = match &args.command {
		Command::Build(build) => build.common.verbose,
		Command::Run(run) => run.common.verbose,
	};
	let default_directives = if verbose {
		"gocrane=debug,compiler=info,program=info"
	} else {
		"gocrane=info,compiler=info,program=info"
	};
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_directives));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	debug!(version = %env!("CARGO_PKG_VERSION"), ?args, "starting gocrane");

	match args.command {
		Command::Build(build) => {
			let (settings, binary) = build.into_settings()?;
			crane::build(&settings, &binary).await?;
		}
		Command::Run(run) => {
			let settings = run.into_settings()?;
			crane::run(settings).await?;
		}
	}

	Ok(())
}
