use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::info;

use crate::error::RuntimeError;

/// Which child stream a forwarded line belongs to.
#[derive(Clone, Copy, Debug)]
pub(crate) enum OutputTag {
	/// Output of the build command.
	Compiler,
	/// Output of the supervised program.
	Program,
}

/// Forwards a child output stream line by line into the log.
///
/// Completes when the stream closes, i.e. when the child exits or drops the descriptor.
pub(crate) async fn forward_lines<R>(tag: OutputTag, reader: R) -> Result<(), RuntimeError>
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(reader).lines();
	loop {
		let line = lines
			.next_line()
			.await
			.map_err(|err| RuntimeError::IoError {
				about: "reading child output",
				err,
			})?;
		let Some(line) = line else { break };
		if line.is_empty() {
			continue;
		}
		match tag {
			OutputTag::Compiler => info!(target: "compiler", "{line}"),
			OutputTag::Program => info!(target: "program", "{line}"),
		}
	}
	Ok(())
}
