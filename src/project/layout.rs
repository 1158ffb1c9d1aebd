use std::{
	collections::BTreeSet,
	path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
	error::RuntimeError,
	filter::{self, FilterTree},
	paths,
	traverse::{self, TraversalOutcome, Visit},
};

/// Segment globs excluded from every project regardless of user rules.
const DEFAULT_EXCLUDES: &[&str] = &[".git", ".github", ".gitignore", ".DS_Store", ".vscode"];

/// The user-supplied rule lists, before compilation.
///
/// Each entry is either a literal path or a segment glob carrying the
/// [`*/` marker](filter::GLOB_MARKER).
#[derive(Clone, Debug, Default)]
pub struct Rules {
	/// Locations required for building the application.
	pub sources: Vec<String>,
	/// Locations required only for running the application.
	pub resources: Vec<String>,
	/// Locations of no interest to either.
	pub excludes: Vec<String>,
}

/// What the project looks like on disk, derived once at startup and immutable afterwards.
#[derive(Debug)]
pub struct Layout {
	/// Accepts everything the watcher should observe.
	pub watch: FilterTree,
	/// Accepts paths whose change requires a rebuild.
	pub source: FilterTree,
	/// Accepts paths whose change requires only a restart.
	pub resource: FilterTree,
	/// Directories the watcher must subscribe to.
	pub watch_dirs: BTreeSet<PathBuf>,
	/// Files participating in the digest.
	pub source_files: BTreeSet<PathBuf>,
	/// Files that are needed at run time but not compiled.
	pub resource_files: BTreeSet<PathBuf>,
	/// Everything the exploration saw, skipped, or failed on.
	pub summary: TraversalOutcome,
}

impl Layout {
	/// Compiles the rule lists into filters and explores the watch roots.
	pub fn explore(rules: &Rules) -> Result<Self, RuntimeError> {
		let (watch, source, resource) = compile_filters(rules)?;

		let mut watch_dirs = BTreeSet::new();
		let mut source_files = BTreeSet::new();
		let mut resource_files = BTreeSet::new();
		let mut summary = TraversalOutcome::default();

		for root in watch.root_paths() {
			let outcome = traverse::traverse(&root, &watch, &mut |path, is_dir| {
				if is_dir {
					watch_dirs.insert(path.to_owned());
				} else if source.is_accepted(path) {
					source_files.insert(path.to_owned());
				} else if resource.is_accepted(path) {
					resource_files.insert(path.to_owned());
				}
				Ok(Visit::Continue)
			});
			summary.absorb(outcome);
		}

		Ok(Self {
			watch,
			source,
			resource,
			watch_dirs,
			source_files,
			resource_files,
			summary,
		})
	}

	/// Logs the full exploration result, one line per path.
	pub fn log_summary(&self) {
		info!(
			visited = self.summary.visited.len(),
			ignored = self.summary.ignored.len(),
			errored = self.summary.errored.len(),
			"explored project"
		);
		for path in &self.summary.ignored {
			debug!(path = %path.display(), "ignored");
		}
		for (path, err) in &self.summary.errored {
			info!(path = %path.display(), %err, "traversal failure");
		}
		for dir in &self.watch_dirs {
			debug!(path = %dir.display(), "watch dir");
		}
		for file in &self.source_files {
			debug!(path = %file.display(), "source file");
		}
		for file in &self.resource_files {
			debug!(path = %file.display(), "resource file");
		}
	}
}

/// Compiles the watch, source, and resource filters from one rule set.
///
/// Sources accept into watch+source; resources accept into watch+resource and reject from
/// source (a location claimed as a resource never triggers a rebuild); excludes and the default
/// excludes reject from all three.
fn compile_filters(rules: &Rules) -> Result<(FilterTree, FilterTree, FilterTree), RuntimeError> {
	let mut watch = FilterTree::new();
	let mut source = FilterTree::new();
	let mut resource = FilterTree::new();

	for entry in &rules.sources {
		if filter::is_glob(entry) {
			let pattern = filter::pattern(entry);
			watch.accept_glob(pattern)?;
			source.accept_glob(pattern)?;
		} else {
			let path = paths::absolutize(Path::new(entry))?;
			watch.accept_path(&path);
			source.accept_path(&path);
		}
	}

	for entry in &rules.resources {
		if filter::is_glob(entry) {
			let pattern = filter::pattern(entry);
			watch.accept_glob(pattern)?;
			resource.accept_glob(pattern)?;
			source.reject_glob(pattern)?;
		} else {
			let path = paths::absolutize(Path::new(entry))?;
			watch.accept_path(&path);
			resource.accept_path(&path);
			source.reject_path(&path);
		}
	}

	for entry in &rules.excludes {
		if filter::is_glob(entry) {
			let pattern = filter::pattern(entry);
			watch.reject_glob(pattern)?;
			source.reject_glob(pattern)?;
			resource.reject_glob(pattern)?;
		} else {
			let path = paths::absolutize(Path::new(entry))?;
			watch.reject_path(&path);
			source.reject_path(&path);
			resource.reject_path(&path);
		}
	}

	for pattern in DEFAULT_EXCLUDES {
		watch.reject_glob(pattern)?;
		source.reject_glob(pattern)?;
		resource.reject_glob(pattern)?;
	}

	Ok((watch, source, resource))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fixture() -> (tempfile::TempDir, PathBuf) {
		let dir = tempfile::tempdir().unwrap();
		let root = dunce::canonicalize(dir.path()).unwrap();
		std::fs::create_dir_all(root.join("cmd/app")).unwrap();
		std::fs::create_dir_all(root.join("static/css")).unwrap();
		std::fs::create_dir_all(root.join(".git")).unwrap();
		std::fs::create_dir_all(root.join("vendor")).unwrap();
		std::fs::write(root.join("main.go"), "package main\n").unwrap();
		std::fs::write(root.join("cmd/app/app.go"), "package app\n").unwrap();
		std::fs::write(root.join("static/css/style.css"), "body {}\n").unwrap();
		std::fs::write(root.join(".git/HEAD"), "ref: x\n").unwrap();
		std::fs::write(root.join("vendor/dep.go"), "package dep\n").unwrap();
		(dir, root)
	}

	fn rules_for(root: &Path) -> Rules {
		Rules {
			sources: vec![root.to_string_lossy().into_owned()],
			resources: vec![root.join("static").to_string_lossy().into_owned()],
			excludes: vec![root.join("vendor").to_string_lossy().into_owned()],
		}
	}

	#[test]
	fn partitions_sources_and_resources() {
		let (_guard, root) = fixture();
		let layout = Layout::explore(&rules_for(&root)).unwrap();

		assert!(layout.source_files.contains(&root.join("main.go")));
		assert!(layout.source_files.contains(&root.join("cmd/app/app.go")));
		assert!(!layout.source_files.contains(&root.join("static/css/style.css")));

		assert!(layout
			.resource_files
			.contains(&root.join("static/css/style.css")));
		assert!(!layout.resource_files.contains(&root.join("main.go")));
	}

	#[test]
	fn excludes_and_defaults_are_honored() {
		let (_guard, root) = fixture();
		let layout = Layout::explore(&rules_for(&root)).unwrap();

		assert!(!layout.source_files.contains(&root.join("vendor/dep.go")));
		assert!(layout.summary.ignored.contains(&root.join(".git")));
		assert!(!layout.watch_dirs.contains(&root.join(".git")));
		assert!(!layout.watch_dirs.contains(&root.join("vendor")));
	}

	#[test]
	fn watch_dirs_cover_the_accepted_tree() {
		let (_guard, root) = fixture();
		let layout = Layout::explore(&rules_for(&root)).unwrap();

		assert!(layout.watch_dirs.contains(&root));
		assert!(layout.watch_dirs.contains(&root.join("cmd")));
		assert!(layout.watch_dirs.contains(&root.join("cmd/app")));
		assert!(layout.watch_dirs.contains(&root.join("static")));
		assert!(layout.watch_dirs.contains(&root.join("static/css")));
	}

	#[test]
	fn glob_rules_apply_to_segments() {
		let (_guard, root) = fixture();
		let mut rules = rules_for(&root);
		rules.excludes.push("*/*.css".to_owned());
		let layout = Layout::explore(&rules).unwrap();

		assert!(layout.resource_files.is_empty());
		assert!(layout
			.summary
			.ignored
			.contains(&root.join("static/css/style.css")));
	}

	#[test]
	fn bad_glob_fails_compilation() {
		let rules = Rules {
			sources: vec!["*/[".to_owned()],
			..Default::default()
		};
		assert!(Layout::explore(&rules).is_err());
	}
}
