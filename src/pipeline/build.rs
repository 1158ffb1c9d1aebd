//! Turns batched change events into build events, invoking the compiler when needed.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::{
	error::CriticalError,
	event::{BuildEvent, ChangeEvent},
	filter::FilterTree,
	project::Builder,
};

/// What a batched change event asks of the stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
	/// None of the paths matter; drop the event.
	Drop,
	/// Only restart-relevant paths changed and a binary exists: re-emit it.
	Restart(PathBuf),
	/// Compile a fresh executable.
	Rebuild,
}

/// Classifies a batched change event against the rebuild and restart filters.
///
/// An empty event and the force-rebuild sentinel both request a rebuild outright; a
/// restart-only change with no binary to restart is promoted to a rebuild.
#[must_use]
pub fn classify(
	event: &ChangeEvent,
	rebuild: &FilterTree,
	restart: &FilterTree,
	last_binary: Option<&Path>,
) -> Action {
	let build = event.paths.is_empty()
		|| event.is_forced()
		|| event.paths.iter().any(|path| rebuild.is_accepted(path));
	if build {
		return Action::Rebuild;
	}

	if event.paths.iter().any(|path| restart.is_accepted(path)) {
		return last_binary.map_or(Action::Rebuild, |binary| Action::Restart(binary.to_owned()));
	}

	Action::Drop
}

/// Launches the build stage.
///
/// Owns a scratch directory for the lifetime of the stage; every successful build lands in a
/// fresh uniquely named file there. Build failures are logged and dropped: the next filesystem
/// change retries naturally. If a bootstrap build event is supplied (digest cache hit), it is
/// forwarded before any input is consumed.
pub async fn worker(
	builder: Builder,
	rebuild: FilterTree,
	restart: FilterTree,
	mut input: mpsc::Receiver<ChangeEvent>,
	output: mpsc::Sender<BuildEvent>,
	bootstrap: Option<BuildEvent>,
	cancel: CancellationToken,
) -> Result<(), CriticalError> {
	debug!("launching build stage");

	let scratch = tempfile::Builder::new()
		.prefix("gocrane-")
		.tempdir()
		.map_err(|err| CriticalError::IoError {
			about: "creating scratch directory",
			err,
		})?;
	debug!(path = %scratch.path().display(), "created scratch directory");

	let mut last_binary = bootstrap.as_ref().map(|event| event.path.clone());
	if let Some(event) = bootstrap {
		info!(path = %event.path.display(), "reusing cached binary");
		if !send(&output, event, &cancel).await? {
			return Ok(());
		}
	}

	loop {
		let event = tokio::select! {
			() = cancel.cancelled() => break,
			received = input.recv() => match received {
				Some(event) => event,
				None => break,
			},
		};

		match classify(&event, &rebuild, &restart, last_binary.as_deref()) {
			Action::Drop => trace!(?event, "change is not relevant, dropping"),
			Action::Restart(path) => {
				info!("restart-only change");
				if !send(&output, BuildEvent { path }, &cancel).await? {
					break;
				}
			}
			Action::Rebuild => {
				info!("building...");
				let dest = scratch
					.path()
					.join(format!("executable-{}", Uuid::new_v4()));
				let built = tokio::select! {
					() = cancel.cancelled() => break,
					built = builder.build(&dest) => built,
				};
				match built {
					Ok(()) => {
						info!("build was successful");
						last_binary = Some(dest.clone());
						if !send(&output, BuildEvent { path: dest }, &cancel).await? {
							break;
						}
					}
					Err(err) => error!(%err, "build failure"),
				}
			}
		}
	}

	debug!("ending build stage");
	Ok(())
}

/// Cancellation-aware send; `false` means the stage was cancelled mid-send.
async fn send(
	output: &mpsc::Sender<BuildEvent>,
	event: BuildEvent,
	cancel: &CancellationToken,
) -> Result<bool, CriticalError> {
	tokio::select! {
		() = cancel.cancelled() => Ok(false),
		sent = output.send(event) => sent
			.map(|()| true)
			.map_err(|_| CriticalError::EventChannelClosed { ctx: "build stage output" }),
	}
}
