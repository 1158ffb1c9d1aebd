//! The two payload types that travel through the pipeline.
//!
//! Change events flow from the watcher through the batcher into the build stage; build events
//! flow from the build stage into the run stage. Both are plain data: stages share nothing else.

use std::path::{Path, PathBuf};

/// A bundle of absolute paths observed to have changed.
///
/// An event with no paths at all is a valid *bootstrap* signal, meaning "act as if something
/// changed". The orchestrator instead uses [`ChangeEvent::forced`] for its cache-miss bootstrap,
/// so that a watcher-produced empty burst and a deliberate rebuild request stay distinguishable
/// in logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeEvent {
	/// The changed paths, in observation order.
	pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
	/// An event for a single changed path.
	pub fn single(path: PathBuf) -> Self {
		Self { paths: vec![path] }
	}

	/// The bootstrap event that unconditionally requests a rebuild.
	#[must_use]
	pub fn forced() -> Self {
		Self {
			paths: vec![force_rebuild_path().to_owned()],
		}
	}

	/// Whether this event carries the force-rebuild sentinel.
	#[must_use]
	pub fn is_forced(&self) -> bool {
		let sentinel = force_rebuild_path();
		self.paths.iter().any(|path| path == sentinel)
	}
}

/// A reference to a newly produced executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildEvent {
	/// The path to the executable file.
	pub path: PathBuf,
}

/// The sentinel path carried by a forced change event.
///
/// The leading NUL byte cannot appear in a real file name on any supported platform, so the
/// sentinel can never collide with a watched path.
pub fn force_rebuild_path() -> &'static Path {
	Path::new("\u{0}gocrane-force-rebuild")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn forced_event_carries_the_sentinel() {
		assert!(ChangeEvent::forced().is_forced());
		assert!(!ChangeEvent::default().is_forced());
		assert!(!ChangeEvent::single(PathBuf::from("/tmp/main.go")).is_forced());
	}

	#[test]
	fn sentinel_survives_batching_with_real_paths() {
		let mut event = ChangeEvent::forced();
		event.paths.push(PathBuf::from("/tmp/main.go"));
		assert!(event.is_forced());
	}
}
