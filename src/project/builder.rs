use std::{
	path::{Path, PathBuf},
	process::Stdio,
};

use tokio::process::Command;
use tracing::debug;

use crate::error::RuntimeError;

use super::logging::{forward_lines, OutputTag};

/// Drives `go build` for the project's main directory.
#[derive(Clone, Debug)]
pub struct Builder {
	main_dir: PathBuf,
	build_args: Vec<String>,
}

impl Builder {
	/// A builder running in `main_dir` with extra user arguments spliced into the command line.
	#[must_use]
	pub fn new(main_dir: PathBuf, build_args: Vec<String>) -> Self {
		Self {
			main_dir,
			build_args,
		}
	}

	/// Runs one build producing the executable at `dest`.
	///
	/// The compiler inherits the environment and runs in the main directory; its output is
	/// forwarded line by line under the `compiler` target. A non-zero exit becomes
	/// [`RuntimeError::Build`]. Dropping the returned future kills an in-flight compile.
	pub async fn build(&self, dest: &Path) -> Result<(), RuntimeError> {
		let mut command = Command::new("go");
		command
			.arg("build")
			.args(&self.build_args)
			.arg("-o")
			.arg(dest)
			.arg("./")
			.current_dir(&self.main_dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		debug!(?command, "invoking go build");
		let mut child = command.spawn().map_err(|err| RuntimeError::IoError {
			about: "spawning go build",
			err,
		})?;

		let stdout = child.stdout.take().expect("stdout was piped");
		let stderr = child.stderr.take().expect("stderr was piped");

		let (status, (), ()) = tokio::try_join!(
			async {
				child.wait().await.map_err(|err| RuntimeError::Process {
					about: "waiting for go build",
					err,
				})
			},
			forward_lines(OutputTag::Compiler, stdout),
			forward_lines(OutputTag::Compiler, stderr),
		)?;

		if status.success() {
			Ok(())
		} else {
			Err(RuntimeError::Build { status })
		}
	}
}
