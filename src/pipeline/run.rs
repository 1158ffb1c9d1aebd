//! Keeps exactly one instance of the built program running.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
	error::CriticalError,
	event::BuildEvent,
	project::{Process, Runner},
};

/// Launches the run stage.
///
/// For each build event the running process (if any) is stopped gracefully, then the new
/// executable is started. Stop-then-start is strictly sequential, so at no instant are two
/// children alive. On cancellation a final stop with the same timeout is performed.
pub async fn worker(
	runner: Runner,
	shutdown_timeout: Duration,
	mut input: mpsc::Receiver<BuildEvent>,
	cancel: CancellationToken,
) -> Result<(), CriticalError> {
	debug!("launching run stage");

	let mut running: Option<Process> = None;

	loop {
		let event = tokio::select! {
			() = cancel.cancelled() => break,
			received = input.recv() => match received {
				Some(event) => event,
				None => break,
			},
		};

		if let Some(process) = running.take() {
			info!(?shutdown_timeout, "stopping running process");
			process.stop(shutdown_timeout).await;
			info!("process stopped");
		}

		info!(path = %event.path.display(), "starting process");
		running = Some(runner.start(&event.path)?);
	}

	if let Some(process) = running.take() {
		info!(?shutdown_timeout, "stopping running process");
		process.stop(shutdown_timeout).await;
		info!("process stopped");
	}

	debug!("ending run stage");
	Ok(())
}

#[cfg(all(test, unix))]
mod tests {
	use std::path::PathBuf;

	use super::*;

	#[tokio::test]
	async fn restarts_are_sequential_and_single_process() {
		let dir = tempfile::tempdir().unwrap();
		let marker = dir.path().join("alive");
		// Each child refuses to start while a sibling's marker exists, then holds its own
		// marker until terminated. Overlapping children would leave the "clash" marker.
		let script = format!(
			"if [ -e {m} ]; then touch {m}.clash; exit 1; fi; \
			 touch {m}; trap 'rm -f {m}; exit 0' TERM; \
			 while true; do sleep 0.05; done",
			m = marker.display()
		);

		let runner = Runner::new(vec!["-c".to_owned(), script]);
		let (in_s, in_r) = mpsc::channel(4);
		let cancel = CancellationToken::new();
		let handle = tokio::spawn(worker(
			runner,
			Duration::from_secs(5),
			in_r,
			cancel.clone(),
		));

		for _ in 0..3 {
			in_s.send(BuildEvent {
				path: PathBuf::from("/bin/sh"),
			})
			.await
			.unwrap();
			tokio::time::sleep(Duration::from_millis(300)).await;
		}

		cancel.cancel();
		handle.await.unwrap().unwrap();

		assert!(
			!marker.with_extension("clash").exists(),
			"two children were alive at once"
		);
		assert!(!marker.exists(), "final stop did not run");
	}
}
