//! Coalesces bursts of change events into one event per idle window.

use std::{mem::take, time::Duration};

use tokio::{
	sync::mpsc,
	time::{sleep, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{error::CriticalError, event::ChangeEvent};

/// Launches the batcher stage.
///
/// Paths of all inputs arriving within `inactivity` of each other accumulate into a single
/// output event. When the idle window elapses the flush arms; the send then contends with
/// further input arrival, so events landing while the downstream stage is busy still join the
/// pending batch. A batch with zero paths (the bootstrap signal) flushes like any other.
pub async fn worker(
	mut input: mpsc::Receiver<ChangeEvent>,
	output: mpsc::Sender<ChangeEvent>,
	inactivity: Duration,
	cancel: CancellationToken,
) -> Result<(), CriticalError> {
	debug!(?inactivity, "launching batcher");

	let mut accumulator = ChangeEvent::default();
	// something accumulated since the last flush
	let mut pending = false;
	// idle window elapsed, flushing allowed
	let mut armed = false;

	let timer = sleep(inactivity);
	tokio::pin!(timer);
	let mut timer_live = false;

	loop {
		tokio::select! {
			() = cancel.cancelled() => {
				trace!("batcher cancelled, discarding accumulator");
				return Ok(());
			}
			permit = output.reserve(), if armed => {
				let permit = permit.map_err(|_| CriticalError::EventChannelClosed {
					ctx: "batcher output",
				})?;
				let batch = take(&mut accumulator);
				trace!(paths = batch.paths.len(), "flushing batch");
				permit.send(batch);
				pending = false;
				armed = false;
			}
			() = &mut timer, if timer_live => {
				timer_live = false;
				if pending {
					armed = true;
				}
			}
			received = input.recv() => match received {
				Some(event) => {
					accumulator.paths.extend(event.paths);
					pending = true;
					timer.as_mut().reset(Instant::now() + inactivity);
					timer_live = true;
				}
				None => {
					debug!("batcher input closed");
					return Ok(());
				}
			}
		}
	}
}
