use std::{
	path::{Path, PathBuf},
	process::Stdio,
	time::Duration,
};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::CriticalError;

use super::logging::{forward_lines, OutputTag};

/// Spawns the built executable with the user's run arguments.
#[derive(Clone, Debug)]
pub struct Runner {
	run_args: Vec<String>,
}

impl Runner {
	#[must_use]
	pub fn new(run_args: Vec<String>) -> Self {
		Self { run_args }
	}

	/// Starts the executable at `path`, forwarding its output under the `program` target.
	pub fn start(&self, path: &Path) -> Result<Process, CriticalError> {
		let mut command = Command::new(path);
		command
			.args(&self.run_args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		debug!(?command, "starting program");
		let mut child = command.spawn().map_err(|err| CriticalError::IoError {
			about: "starting program",
			err,
		})?;

		if let Some(stdout) = child.stdout.take() {
			tokio::spawn(forward_lines(OutputTag::Program, stdout));
		}
		if let Some(stderr) = child.stderr.take() {
			tokio::spawn(forward_lines(OutputTag::Program, stderr));
		}

		Ok(Process {
			path: path.to_owned(),
			child,
		})
	}
}

/// A running child process.
///
/// Consuming [`stop`](Process::stop) is the only way out, so a stopped process can never be
/// mistaken for a running one.
#[derive(Debug)]
pub struct Process {
	path: PathBuf,
	child: Child,
}

impl Process {
	/// Requests a graceful stop and reaps the child.
	///
	/// Sends the platform termination signal, waits up to `timeout`, then force-kills. A
	/// non-zero exit is logged at warning level, never propagated: the program was asked to die.
	pub async fn stop(mut self, timeout: Duration) {
		self.terminate();

		match tokio::time::timeout(timeout, self.child.wait()).await {
			Ok(Ok(status)) => {
				if !status.success() {
					warn!(path = %self.path.display(), %status, "program exited with non-zero status");
				}
			}
			Ok(Err(err)) => {
				warn!(path = %self.path.display(), %err, "failed to wait for program");
			}
			Err(_elapsed) => {
				warn!(path = %self.path.display(), ?timeout, "program ignored termination, killing");
				if let Err(err) = self.child.kill().await {
					warn!(path = %self.path.display(), %err, "failed to kill program");
				}
			}
		}
	}

	#[cfg(unix)]
	fn terminate(&self) {
		use nix::{sys::signal, unistd::Pid};

		// id() is None once the child has been reaped; it has not been, so a None here means
		// the process is already gone and there is nothing to signal.
		let Some(pid) = self.child.id() else { return };
		#[allow(clippy::cast_possible_wrap)]
		let pid = Pid::from_raw(pid as i32);
		if let Err(err) = signal::kill(pid, signal::Signal::SIGTERM) {
			warn!(path = %self.path.display(), %err, "failed to signal program");
		}
	}

	#[cfg(windows)]
	fn terminate(&mut self) {
		// No SIGTERM equivalent; fall through to the kill that wait-with-timeout performs.
		if let Err(err) = self.child.start_kill() {
			warn!(path = %self.path.display(), %err, "failed to kill program");
		}
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	fn sh_runner(script: &str) -> (Runner, PathBuf) {
		(
			Runner::new(vec!["-c".to_owned(), script.to_owned()]),
			PathBuf::from("/bin/sh"),
		)
	}

	#[tokio::test]
	async fn graceful_stop_returns_before_the_timeout() {
		let (runner, sh) = sh_runner("sleep 30");
		let process = runner.start(&sh).unwrap();

		let started = std::time::Instant::now();
		process.stop(Duration::from_secs(5)).await;
		assert!(started.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn term_ignoring_child_is_killed_within_the_timeout() {
		let (runner, sh) = sh_runner("trap '' TERM; sleep 30");
		let process = runner.start(&sh).unwrap();
		// give the shell a moment to install the trap
		tokio::time::sleep(Duration::from_millis(200)).await;

		let started = std::time::Instant::now();
		process.stop(Duration::from_millis(500)).await;
		let elapsed = started.elapsed();
		assert!(elapsed >= Duration::from_millis(500));
		assert!(elapsed < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn start_failure_is_critical() {
		let runner = Runner::new(Vec::new());
		assert!(runner.start(Path::new("/definitely/not/here")).is_err());
	}
}
