use std::{path::PathBuf, process::ExitStatus};

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::ChangeEvent;

/// Errors which may be recoverable, transient, or only affect a part of the operation, and should
/// be reported to the user, but will not outright stop gocrane.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum RuntimeError {
	/// Generic I/O error, with some context.
	#[error("io({about}): {err}")]
	#[diagnostic(code(gocrane::runtime::io_error))]
	IoError {
		/// What it was about.
		about: &'static str,

		/// The I/O error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// Error received when a segment glob pattern fails to parse.
	#[error("cannot parse glob {glob:?}: {err}")]
	#[diagnostic(code(gocrane::runtime::glob_parse))]
	GlobParse {
		/// The offending pattern, without the glob marker.
		glob: String,

		/// The underlying error.
		#[source]
		err: globset::Error,
	},

	/// Error received when a path cannot be made absolute.
	#[error("cannot make path absolute {path:?}: {err}")]
	#[diagnostic(code(gocrane::runtime::path_absolutize))]
	PathAbsolutize {
		/// The path that could not be resolved.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// Error received while walking a directory tree.
	///
	/// This only covers the offending subtree; the rest of the traversal proceeds.
	#[error("cannot traverse {path:?}: {err}")]
	#[diagnostic(code(gocrane::runtime::traverse))]
	Traverse {
		/// The path at which traversal failed.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// Events from the filesystem watcher event source.
	#[error("fs watcher error: {0}")]
	#[diagnostic(code(gocrane::runtime::fs_watcher))]
	FsWatcherEvent(#[source] notify::Error),

	/// Error received when a path cannot be subscribed to.
	#[error("cannot watch {path:?}: {err}")]
	#[diagnostic(code(gocrane::runtime::fs_watcher_path_add))]
	FsWatcherPathAdd {
		/// The path that could not be watched.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: notify::Error,
	},

	/// Error received when a path cannot be unsubscribed from.
	///
	/// A watch that no longer exists is not reported through this: removal of a missing watch
	/// counts as success.
	#[error("cannot unwatch {path:?}: {err}")]
	#[diagnostic(code(gocrane::runtime::fs_watcher_path_remove))]
	FsWatcherPathRemove {
		/// The path that could not be unwatched.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: notify::Error,
	},

	/// Error received when a change event cannot be queued without blocking.
	#[error("cannot queue change event from {ctx}: {err}")]
	#[diagnostic(code(gocrane::runtime::event_channel_try_send))]
	EventChannelTrySend {
		/// The context in which this error happened.
		///
		/// This is not stable and its value should not be relied on except for printing the error.
		ctx: &'static str,

		/// The underlying error.
		#[source]
		err: mpsc::error::TrySendError<ChangeEvent>,
	},

	/// Error received when the build command exits unsuccessfully.
	#[error("go build exited with {status}")]
	#[diagnostic(code(gocrane::runtime::build))]
	Build {
		/// The exit status of the build command.
		status: ExitStatus,
	},

	/// Error received when operating on a child process.
	#[error("process({about}): {err}")]
	#[diagnostic(code(gocrane::runtime::process))]
	Process {
		/// What it was about.
		about: &'static str,

		/// The I/O error which occurred.
		#[source]
		err: std::io::Error,
	},
}
