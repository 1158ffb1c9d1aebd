//! The command-line surface.
//!
//! Every flag has a `GOCRANE_*` environment fallback so the tool drops into a container
//! entrypoint without a wrapper script. List-valued flags accept repetition on the command line
//! and comma separation in the environment; `--build-arg` / `--run-arg` take one shell-style
//! string each.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};

use crate::{crane::Settings, project::Rules};

const DEFAULT_BATCH_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
	name = "gocrane",
	version,
	about = "Live-reload development supervisor for Go projects"
)]
pub struct Args {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Build the project once and record a digest of its sources next to the binary.
	Build(BuildArgs),
	/// Watch the project and keep a freshly built binary running.
	Run(RunArgs),
}

#[derive(Debug, clap::Args)]
pub struct CommonArgs {
	/// Verbose logging.
	#[arg(short, long, env = "GOCRANE_VERBOSE")]
	pub verbose: bool,

	/// Folder(s) and/or file(s) required for building the application.
	///
	/// Entries prefixed with `*/` are matched as globs against single path segments.
	#[arg(
		long = "source",
		alias = "src",
		env = "GOCRANE_SOURCES",
		value_delimiter = ',',
		default_value = "./"
	)]
	pub sources: Vec<String>,

	/// Folder(s) and/or file(s) required only for running the application.
	#[arg(
		long = "resource",
		alias = "res",
		env = "GOCRANE_RESOURCES",
		value_delimiter = ','
	)]
	pub resources: Vec<String>,

	/// Folder(s) and/or file(s) of no interest for building or running.
	#[arg(
		long = "exclude",
		alias = "ex",
		env = "GOCRANE_EXCLUDES",
		value_delimiter = ','
	)]
	pub excludes: Vec<String>,

	/// Directory that contains the main package to build.
	#[arg(long = "main", env = "GOCRANE_MAIN", default_value = "./")]
	pub main_dir: PathBuf,

	/// File used to track the state of the sources between runs.
	#[arg(long = "digest", alias = "dig", env = "GOCRANE_DIGEST")]
	pub digest: Option<PathBuf>,

	/// Arguments for `go build`, split shell-style.
	#[arg(
		long = "build-arg",
		alias = "ba",
		env = "GOCRANE_BUILD_ARGS",
		allow_hyphen_values = true
	)]
	pub build_args: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct BuildArgs {
	#[command(flatten)]
	pub common: CommonArgs,

	/// Output location of the built binary.
	#[arg(long = "binary", alias = "bin", env = "GOCRANE_BINARY")]
	pub binary: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
	#[command(flatten)]
	pub common: CommonArgs,

	/// Prebuilt binary to try before the first build.
	#[arg(long = "binary", alias = "bin", env = "GOCRANE_BINARY")]
	pub binary: Option<PathBuf>,

	/// Arguments passed to the spawned program, split shell-style.
	#[arg(
		long = "run-arg",
		alias = "ra",
		env = "GOCRANE_RUN_ARGS",
		allow_hyphen_values = true
	)]
	pub run_args: Option<String>,

	/// Time to accumulate change events before triggering a build.
	#[arg(
		long = "batch-duration",
		alias = "bd",
		env = "GOCRANE_BATCH_DURATION",
		value_parser = humantime::parse_duration,
		default_value = "1s"
	)]
	pub batch_duration: Duration,

	/// Time to wait for the program to exit gracefully before killing it.
	#[arg(
		long = "shutdown-timeout",
		alias = "st",
		env = "GOCRANE_SHUTDOWN_TIMEOUT",
		value_parser = humantime::parse_duration,
		default_value = "5s"
	)]
	pub shutdown_timeout: Duration,
}

impl BuildArgs {
	/// Resolves into pipeline settings plus the required binary location.
	pub fn into_settings(self) -> Result<(Settings, PathBuf)> {
		let settings = Settings {
			verbose: self.common.verbose,
			rules: rules(&self.common),
			main_dir: self.common.main_dir,
			binary: None,
			digest_file: self.common.digest,
			build_args: split_args(self.common.build_args.as_deref(), "--build-arg")?,
			run_args: Vec::new(),
			batch_duration: DEFAULT_BATCH_DURATION,
			shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
		};
		Ok((settings, self.binary))
	}
}

impl RunArgs {
	/// Resolves into pipeline settings.
	pub fn into_settings(self) -> Result<Settings> {
		Ok(Settings {
			verbose: self.common.verbose,
			rules: rules(&self.common),
			main_dir: self.common.main_dir,
			binary: self.binary,
			digest_file: self.common.digest,
			build_args: split_args(self.common.build_args.as_deref(), "--build-arg")?,
			run_args: split_args(self.run_args.as_deref(), "--run-arg")?,
			batch_duration: self.batch_duration,
			shutdown_timeout: self.shutdown_timeout,
		})
	}
}

fn rules(common: &CommonArgs) -> Rules {
	Rules {
		sources: common.sources.clone(),
		resources: common.resources.clone(),
		excludes: common.excludes.clone(),
	}
}

fn split_args(raw: Option<&str>, flag: &'static str) -> Result<Vec<String>> {
	raw.map_or_else(
		|| Ok(Vec::new()),
		|raw| {
			shell_words::split(raw)
				.into_diagnostic()
				.wrap_err_with(|| format!("parsing {flag}"))
		},
	)
}
