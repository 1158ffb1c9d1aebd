//! The two operating modes, wiring the stages together.
//!
//! `build` performs one compile and records the source digest next to the binary. `run` keeps
//! the four-stage pipeline (watch → batch → build → run) alive until a signal arrives or a
//! stage fails critically, seeding it at startup so it always converges to a running process.

use std::{
	collections::BTreeSet,
	future::Future,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
	error::CriticalError,
	event::{BuildEvent, ChangeEvent},
	paths, pipeline,
	project::{digest, Builder, Layout, Rules, Runner},
};

/// Size of the watcher→batcher queue. The watcher drops events when it overflows; the batcher
/// coalesces the survivors of the burst, so nothing of consequence is lost.
const CHANGE_QUEUE_SIZE: usize = 1024;

/// Everything the two modes need, as resolved from the CLI.
#[derive(Clone, Debug)]
pub struct Settings {
	/// Log the full exploration summary at startup.
	pub verbose: bool,
	/// The raw source/resource/exclude rule lists.
	pub rules: Rules,
	/// Directory containing the main package.
	pub main_dir: PathBuf,
	/// Prebuilt binary to try before the first build (run mode only).
	pub binary: Option<PathBuf>,
	/// Explicit digest file location; `None` means `<binary>.dig`.
	pub digest_file: Option<PathBuf>,
	/// Extra arguments spliced into `go build`.
	pub build_args: Vec<String>,
	/// Arguments passed to the spawned program.
	pub run_args: Vec<String>,
	/// Idle window of the batcher.
	pub batch_duration: Duration,
	/// Graceful-stop timeout of the run stage.
	pub shutdown_timeout: Duration,
}

/// One-shot mode: build the binary and persist the digest of its inputs.
pub async fn build(settings: &Settings, binary: &Path) -> Result<(), CriticalError> {
	let layout = Layout::explore(&settings.rules).map_err(CriticalError::Elevated)?;
	if settings.verbose {
		layout.log_summary();
	}

	let main_dir = paths::absolutize(&settings.main_dir)?;
	let builder = Builder::new(main_dir, settings.build_args.clone());

	info!(binary = %binary.display(), "building...");
	builder.build(binary).await?;
	info!("build was successful");

	let digest = digest::compute(&layout.source_files)?;
	let digest_file = settings
		.digest_file
		.clone()
		.unwrap_or_else(|| paths::digest_path_for(binary));
	digest::write_digest(&digest_file, &digest).map_err(|err| CriticalError::DigestWrite {
		path: digest_file.clone(),
		err,
	})?;
	info!(file = %digest_file.display(), %digest, "digest written");

	Ok(())
}

/// Long-running mode: supervise the pipeline until a signal or a critical failure.
pub async fn run(settings: Settings) -> Result<(), CriticalError> {
	info!("starting...");

	let layout = Layout::explore(&settings.rules).map_err(CriticalError::Elevated)?;
	if settings.verbose {
		layout.log_summary();
	}

	let Layout {
		watch,
		source,
		resource,
		source_files,
		..
	} = layout;

	let bootstrap = bootstrap_event(&settings, &source_files)?;

	let roots = watch.root_paths();
	let watch = Arc::new(watch);

	let main_dir = paths::absolutize(&settings.main_dir)?;
	let builder = Builder::new(main_dir, settings.build_args.clone());
	let runner = Runner::new(settings.run_args.clone());

	let cancel = CancellationToken::new();
	let (change_s, change_r) = mpsc::channel(CHANGE_QUEUE_SIZE);
	// Unbuffered handoff is the intent; capacity 1 is the closest tokio offers, and it keeps
	// backpressure flowing from the run stage all the way back to the batcher.
	let (batch_s, batch_r) = mpsc::channel(1);
	let (build_s, build_r) = mpsc::channel(1);

	let initial_build = match bootstrap {
		Bootstrap::Cached(event) => Some(event),
		Bootstrap::Rebuild(event) => {
			change_s
				.try_send(event)
				.map_err(|_| CriticalError::EventChannelClosed {
					ctx: "bootstrap change",
				})?;
			None
		}
	};

	let stages = [
		(
			"signal",
			spawn_stage(cancel.clone(), pipeline::signal::worker(cancel.clone())),
		),
		(
			"watch",
			spawn_stage(
				cancel.clone(),
				pipeline::watch::worker(watch, roots, change_s.clone(), cancel.clone()),
			),
		),
		(
			"batch",
			spawn_stage(
				cancel.clone(),
				pipeline::batch::worker(
					change_r,
					batch_s,
					settings.batch_duration,
					cancel.clone(),
				),
			),
		),
		(
			"build",
			spawn_stage(
				cancel.clone(),
				pipeline::build::worker(
					builder,
					source,
					resource,
					batch_r,
					build_s,
					initial_build,
					cancel.clone(),
				),
			),
		),
		(
			"run",
			spawn_stage(
				cancel.clone(),
				pipeline::run::worker(runner, settings.shutdown_timeout, build_r, cancel.clone()),
			),
		),
	];
	drop(change_s);

	let mut first_error = None;
	for (stage, handle) in stages {
		match handle.await {
			Ok(Ok(())) => debug!(%stage, "stage finished"),
			Ok(Err(err)) => {
				error!(%stage, %err, "stage failed");
				first_error.get_or_insert(err);
			}
			Err(err) => {
				first_error.get_or_insert(CriticalError::StageTaskJoin(err));
			}
		}
	}

	first_error.map_or_else(
		|| {
			info!("stopped.");
			Ok(())
		},
		Err,
	)
}

/// Spawns a stage; a stage that fails takes the whole pipeline down with it.
fn spawn_stage(
	cancel: CancellationToken,
	stage: impl Future<Output = Result<(), CriticalError>> + Send + 'static,
) -> JoinHandle<Result<(), CriticalError>> {
	tokio::spawn(async move {
		let result = stage.await;
		if result.is_err() {
			cancel.cancel();
		}
		result
	})
}

/// The one event seeded into the pipeline at startup.
#[derive(Debug)]
enum Bootstrap {
	/// Digest cache hit: hand the prebuilt binary straight to the run stage.
	Cached(BuildEvent),
	/// No binary or stale digest: force the first build.
	Rebuild(ChangeEvent),
}

fn bootstrap_event(
	settings: &Settings,
	source_files: &BTreeSet<PathBuf>,
) -> Result<Bootstrap, CriticalError> {
	let Some(binary) = &settings.binary else {
		return Ok(Bootstrap::Rebuild(ChangeEvent::forced()));
	};

	let explicit = settings.digest_file.is_some();
	let digest_file = settings
		.digest_file
		.clone()
		.unwrap_or_else(|| paths::digest_path_for(binary));

	match digest::read_digest(&digest_file) {
		Ok(stored) => {
			let current = digest::compute(source_files)?;
			if stored == current {
				info!(binary = %binary.display(), "sources unchanged, reusing cached binary");
				Ok(Bootstrap::Cached(BuildEvent {
					path: paths::absolutize(binary)?,
				}))
			} else {
				info!("sources changed since the cached build");
				Ok(Bootstrap::Rebuild(ChangeEvent::forced()))
			}
		}
		Err(err) if explicit => Err(CriticalError::DigestRead {
			path: digest_file,
			err,
		}),
		Err(err) => {
			debug!(file = %digest_file.display(), %err, "no usable digest, rebuilding");
			Ok(Bootstrap::Rebuild(ChangeEvent::forced()))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings() -> Settings {
		Settings {
			verbose: false,
			rules: Rules::default(),
			main_dir: PathBuf::from("./"),
			binary: None,
			digest_file: None,
			build_args: Vec::new(),
			run_args: Vec::new(),
			batch_duration: Duration::from_secs(1),
			shutdown_timeout: Duration::from_secs(5),
		}
	}

	fn project() -> (tempfile::TempDir, PathBuf, BTreeSet<PathBuf>) {
		let dir = tempfile::tempdir().unwrap();
		let root = dunce::canonicalize(dir.path()).unwrap();
		let main = root.join("main.go");
		std::fs::write(&main, "package main\n").unwrap();
		let binary = root.join("app");
		std::fs::write(&binary, "").unwrap();
		(dir, binary, BTreeSet::from([main]))
	}

	#[test]
	fn no_binary_forces_a_rebuild() {
		let bootstrap = bootstrap_event(&settings(), &BTreeSet::new()).unwrap();
		assert!(matches!(
			bootstrap,
			Bootstrap::Rebuild(event) if event.is_forced()
		));
	}

	#[test]
	fn matching_digest_reuses_the_binary() {
		let (_guard, binary, sources) = project();
		let digest = digest::compute(&sources).unwrap();
		digest::write_digest(&paths::digest_path_for(&binary), &digest).unwrap();

		let mut settings = settings();
		settings.binary = Some(binary.clone());

		let bootstrap = bootstrap_event(&settings, &sources).unwrap();
		assert!(matches!(
			bootstrap,
			Bootstrap::Cached(event) if event.path == binary
		));
	}

	#[test]
	fn stale_digest_forces_a_rebuild() {
		let (_guard, binary, sources) = project();
		digest::write_digest(&paths::digest_path_for(&binary), "0000").unwrap();

		let mut settings = settings();
		settings.binary = Some(binary);

		let bootstrap = bootstrap_event(&settings, &sources).unwrap();
		assert!(matches!(bootstrap, Bootstrap::Rebuild(_)));
	}

	#[test]
	fn missing_default_digest_is_a_cache_miss() {
		let (_guard, binary, sources) = project();

		let mut settings = settings();
		settings.binary = Some(binary);

		let bootstrap = bootstrap_event(&settings, &sources).unwrap();
		assert!(matches!(bootstrap, Bootstrap::Rebuild(_)));
	}

	#[test]
	fn missing_explicit_digest_is_critical() {
		let (_guard, binary, sources) = project();

		let mut settings = settings();
		settings.binary = Some(binary);
		settings.digest_file = Some(PathBuf::from("/definitely/not/here.dig"));

		let err = bootstrap_event(&settings, &sources).unwrap_err();
		assert!(matches!(err, CriticalError::DigestRead { .. }));
	}
}
