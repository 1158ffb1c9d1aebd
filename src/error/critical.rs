use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use tokio::task::JoinError;

use super::RuntimeError;

/// Errors which are not recoverable and stop gocrane execution.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum CriticalError {
	/// A runtime error which cannot be recovered from in the current mode.
	///
	/// Used where a normally-recoverable failure (a glob that does not parse, a one-shot build
	/// that fails) happens before or outside the event pipeline, where nothing will retry it.
	#[error(transparent)]
	#[diagnostic(code(gocrane::critical::elevated))]
	Elevated(#[from] RuntimeError),

	/// A critical I/O error occurred.
	#[error("io({about}): {err}")]
	#[diagnostic(code(gocrane::critical::io_error))]
	IoError {
		/// What it was about.
		about: &'static str,

		/// The I/O error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// Error received when the filesystem watcher cannot be instantiated.
	#[error("cannot create filesystem watcher: {0}")]
	#[diagnostic(code(gocrane::critical::fs_watcher_init))]
	FsWatcherInit(#[source] notify::Error),

	/// Error received when an explicitly requested digest file cannot be read.
	#[error("cannot read digest file {path:?}: {err}")]
	#[diagnostic(code(gocrane::critical::digest_read))]
	DigestRead {
		/// The path to the digest file.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// Error received when the digest file cannot be written.
	#[error("cannot write digest file {path:?}: {err}")]
	#[diagnostic(code(gocrane::critical::digest_write))]
	DigestWrite {
		/// The path to the digest file.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// Error received when a pipeline queue is closed while a stage still needs it.
	#[error("event channel closed early ({ctx})")]
	#[diagnostic(code(gocrane::critical::event_channel_closed))]
	EventChannelClosed {
		/// The context in which this error happened.
		///
		/// This is not stable and its value should not be relied on except for printing the error.
		ctx: &'static str,
	},

	/// Error received when joining a pipeline stage task.
	#[error("stage task join: {0}")]
	#[diagnostic(code(gocrane::critical::stage_task_join))]
	StageTaskJoin(#[from] JoinError),
}
