//! Trips the shared cancellation token when the supervisor itself is told to stop.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CriticalError;

/// Launches the signal listener.
///
/// Completes after the first interrupt/terminate signal (having cancelled the token), or when
/// some other stage cancels the token first.
pub async fn worker(cancel: CancellationToken) -> Result<(), CriticalError> {
	imp_worker(cancel).await
}

#[cfg(unix)]
async fn imp_worker(cancel: CancellationToken) -> Result<(), CriticalError> {
	use tokio::signal::unix::{signal, SignalKind};

	debug!("launching unix signal listener");

	let mut interrupt = signal(SignalKind::interrupt()).map_err(|err| CriticalError::IoError {
		about: "setting interrupt signal listener",
		err,
	})?;
	let mut terminate = signal(SignalKind::terminate()).map_err(|err| CriticalError::IoError {
		about: "setting terminate signal listener",
		err,
	})?;

	tokio::select! {
		_ = interrupt.recv() => info!("received interrupt, shutting down"),
		_ = terminate.recv() => info!("received terminate, shutting down"),
		() = cancel.cancelled() => return Ok(()),
	}

	cancel.cancel();
	Ok(())
}

#[cfg(windows)]
async fn imp_worker(cancel: CancellationToken) -> Result<(), CriticalError> {
	use tokio::signal::windows::{ctrl_break, ctrl_c};

	debug!("launching windows signal listener");

	let mut interrupt = ctrl_c().map_err(|err| CriticalError::IoError {
		about: "setting ctrl-c listener",
		err,
	})?;
	let mut terminate = ctrl_break().map_err(|err| CriticalError::IoError {
		about: "setting ctrl-break listener",
		err,
	})?;

	tokio::select! {
		_ = interrupt.recv() => info!("received ctrl-c, shutting down"),
		_ = terminate.recv() => info!("received ctrl-break, shutting down"),
		() = cancel.cancelled() => return Ok(()),
	}

	cancel.cancel();
	Ok(())
}
