//! Event source for changes to files and directories.

use std::{
	collections::BTreeSet,
	path::{Path, PathBuf},
	sync::Arc,
};

use notify::{
	event::{ModifyKind, RenameMode},
	EventKind, RecommendedWatcher, RecursiveMode, Watcher as _,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{
	error::{CriticalError, RuntimeError},
	event::ChangeEvent,
	filter::FilterTree,
	paths,
	traverse::{self, Visit},
};

/// Raw notify results are buffered here before the worker picks them up. The notify callback
/// must never block, so overflow drops the raw event; the batcher coalesces whatever survives
/// of the same burst.
const RAW_QUEUE_SIZE: usize = 1024;

/// Launches the filesystem watcher stage.
///
/// Subscribes non-recursively to every accepted directory under the given roots, then turns raw
/// notifications into [`ChangeEvent`]s on the output queue. Subscriptions follow the tree as it
/// evolves: created directories are subscribed, removed ones unsubscribed.
pub async fn worker(
	filter: Arc<FilterTree>,
	roots: Vec<PathBuf>,
	events: mpsc::Sender<ChangeEvent>,
	cancel: CancellationToken,
) -> Result<(), CriticalError> {
	debug!("launching filesystem worker");

	let (raw_s, mut raw_r) = mpsc::channel(RAW_QUEUE_SIZE);
	let mut watcher =
		notify::recommended_watcher(move |event: Result<notify::Event, notify::Error>| {
			if raw_s.try_send(event).is_err() {
				warn!("raw event queue full, dropping filesystem event");
			}
		})
		.map_err(CriticalError::FsWatcherInit)?;

	let mut tracked = BTreeSet::new();
	for root in &roots {
		let found = subscribe_tree(&mut watcher, &filter, &mut tracked, root);
		debug!(root = %root.display(), paths = found.len(), "watching tree");
	}

	loop {
		tokio::select! {
			() = cancel.cancelled() => break,
			received = raw_r.recv() => match received {
				Some(Ok(event)) => {
					handle_event(&mut watcher, &filter, &mut tracked, &events, event);
				}
				Some(Err(err)) => {
					let err = RuntimeError::FsWatcherEvent(err);
					error!(%err, "filesystem watcher error");
				}
				None => break,
			},
		}
	}

	debug!("ending filesystem worker");
	Ok(())
}

fn handle_event(
	watcher: &mut RecommendedWatcher,
	filter: &FilterTree,
	tracked: &mut BTreeSet<PathBuf>,
	out: &mpsc::Sender<ChangeEvent>,
	event: notify::Event,
) {
	trace!(?event, "raw filesystem event");

	// Metadata-only events carry no content change, and some platforms produce one per save.
	if matches!(
		event.kind,
		EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_))
	) {
		return;
	}

	// A two-path rename is a removal at the old name and a creation at the new one.
	if event.kind == EventKind::Modify(ModifyKind::Name(RenameMode::Both)) {
		if let [from, to] = &event.paths[..] {
			if let Some(from) = normalized_accepted(filter, from) {
				removed(watcher, tracked, out, &from);
			}
			if let Some(to) = normalized_accepted(filter, to) {
				created(watcher, filter, tracked, out, &to);
			}
			return;
		}
	}

	for path in &event.paths {
		let Some(path) = normalized_accepted(filter, path) else {
			continue;
		};
		match event.kind {
			EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
				created(watcher, filter, tracked, out, &path);
			}
			EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
				removed(watcher, tracked, out, &path);
			}
			_ => emit(out, ChangeEvent::single(path)),
		}
	}
}

/// Normalizes an event path and applies the watch filter; `None` means drop.
fn normalized_accepted(filter: &FilterTree, path: &Path) -> Option<PathBuf> {
	match paths::absolutize(path) {
		Ok(path) => filter.is_accepted(&path).then_some(path),
		Err(err) => {
			error!(%err, "dropping event with unusable path");
			None
		}
	}
}

/// Subscribes to every accepted directory under `root` and tracks every accepted path.
///
/// Returns the accepted paths seen, whether or not they were already tracked.
fn subscribe_tree(
	watcher: &mut RecommendedWatcher,
	filter: &FilterTree,
	tracked: &mut BTreeSet<PathBuf>,
	root: &Path,
) -> BTreeSet<PathBuf> {
	let outcome = traverse::traverse(root, filter, &mut |path, is_dir| {
		if is_dir && !tracked.contains(path) {
			if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
				let err = RuntimeError::FsWatcherPathAdd {
					path: path.to_owned(),
					err,
				};
				error!(%err, "cannot watch directory");
				return Ok(Visit::Skip);
			}
			debug!(path = %path.display(), "watching directory");
		}
		tracked.insert(path.to_owned());
		Ok(Visit::Continue)
	});

	for (path, err) in &outcome.errored {
		warn!(path = %path.display(), %err, "traversal failure while subscribing");
	}

	outcome.visited
}

/// A path appeared: subscribe to whatever it brought and announce the additions.
fn created(
	watcher: &mut RecommendedWatcher,
	filter: &FilterTree,
	tracked: &mut BTreeSet<PathBuf>,
	out: &mpsc::Sender<ChangeEvent>,
	path: &Path,
) {
	let found = subscribe_tree(watcher, filter, tracked, path);
	if !found.is_empty() {
		emit(
			out,
			ChangeEvent {
				paths: found.into_iter().collect(),
			},
		);
	}
}

/// A path went away: untrack and unsubscribe everything under it and announce the removals.
fn removed(
	watcher: &mut RecommendedWatcher,
	tracked: &mut BTreeSet<PathBuf>,
	out: &mpsc::Sender<ChangeEvent>,
	path: &Path,
) {
	let mut gone: Vec<PathBuf> = tracked
		.iter()
		.filter(|tracked_path| tracked_path.starts_with(path))
		.cloned()
		.collect();

	for gone_path in &gone {
		tracked.remove(gone_path);
		match watcher.unwatch(gone_path) {
			// Tracked files were never watched, and a platform may drop watches of deleted
			// directories on its own; a missing watch is a successful removal.
			Ok(())
			| Err(notify::Error {
				kind: notify::ErrorKind::WatchNotFound,
				..
			}) => {}
			Err(err) => {
				let err = RuntimeError::FsWatcherPathRemove {
					path: gone_path.clone(),
					err,
				};
				warn!(%err, "cannot unwatch removed path");
			}
		}
	}

	if !gone.iter().any(|gone_path| gone_path == path) {
		gone.push(path.to_owned());
	}
	emit(out, ChangeEvent { paths: gone });
}

fn emit(out: &mpsc::Sender<ChangeEvent>, event: ChangeEvent) {
	trace!(?event, "emitting change event");
	if let Err(err) = out.try_send(event) {
		let err = RuntimeError::EventChannelTrySend {
			ctx: "fs watcher",
			err,
		};
		warn!(%err, "change queue full, dropping event");
	}
}
