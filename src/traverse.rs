//! Filtered directory traversal.
//!
//! Walks a root, feeding every entry through a [`FilterTree`] cursor and a visitor, and
//! partitions the encountered paths into disjoint visited / ignored / errored sets. Rejected
//! directories are pruned without descending into them.

use std::{
	collections::{BTreeMap, BTreeSet},
	path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::{
	error::RuntimeError,
	filter::{FilterCursor, FilterTree},
	paths,
};

/// What the visitor decided about an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
	/// Record the entry as visited and keep going.
	Continue,
	/// Record the entry as ignored; for a directory, skip its subtree.
	Skip,
}

/// The visitor callback: receives the absolute path and whether it is a directory.
pub type VisitFn<'f> = dyn FnMut(&Path, bool) -> Result<Visit, RuntimeError> + 'f;

/// The disjoint path sets produced by a traversal.
#[derive(Debug, Default)]
pub struct TraversalOutcome {
	/// Paths passed to the visitor without error.
	pub visited: BTreeSet<PathBuf>,
	/// Paths rejected by the filter or skipped by the visitor.
	pub ignored: BTreeSet<PathBuf>,
	/// Paths on which traversal or the visitor failed.
	pub errored: BTreeMap<PathBuf, RuntimeError>,
}

impl TraversalOutcome {
	/// Folds another outcome into this one, e.g. when traversing several roots.
	pub fn absorb(&mut self, other: Self) {
		self.visited.extend(other.visited);
		self.ignored.extend(other.ignored);
		self.errored.extend(other.errored);
	}
}

/// Walks `root`, which must be absolute.
///
/// A root that is a file is visited once and traversal ends; a root that does not exist is
/// recorded as errored. Directory entries rejected by the filter are recorded as ignored and
/// their subtrees are not entered.
pub fn traverse(root: &Path, filter: &FilterTree, visit: &mut VisitFn<'_>) -> TraversalOutcome {
	let mut outcome = TraversalOutcome::default();

	let meta = match std::fs::symlink_metadata(root) {
		Ok(meta) => meta,
		Err(err) => {
			outcome.errored.insert(
				root.to_owned(),
				RuntimeError::Traverse {
					path: root.to_owned(),
					err,
				},
			);
			return outcome;
		}
	};

	// A file root has no tree to walk; honor the filter and visit it once.
	if !meta.is_dir() {
		if filter.is_accepted(root) {
			record(&mut outcome, root, false, visit);
		} else {
			outcome.ignored.insert(root.to_owned());
		}
		return outcome;
	}

	let root_cursor = {
		let mut cursor = filter.cursor();
		for segment in paths::segments(root) {
			cursor = cursor.navigate(segment);
		}
		cursor
	};

	// Cursor state per directory depth; stack[d] belongs to the directory at depth d.
	let mut stack: Vec<FilterCursor<'_>> = Vec::new();
	let mut iter = WalkDir::new(root).into_iter();

	while let Some(entry) = iter.next() {
		let entry = match entry {
			Ok(entry) => entry,
			Err(err) => {
				let path = err
					.path()
					.map_or_else(|| root.to_owned(), Path::to_owned);
				outcome.errored.insert(
					path.clone(),
					RuntimeError::Traverse {
						path,
						err: err.into(),
					},
				);
				continue;
			}
		};

		let depth = entry.depth();
		let is_dir = entry.file_type().is_dir();
		let cursor = if depth == 0 {
			root_cursor
		} else {
			stack.truncate(depth);
			stack[depth - 1].navigate(entry.file_name())
		};

		if !cursor.is_accepted() {
			outcome.ignored.insert(entry.path().to_owned());
			if is_dir {
				iter.skip_current_dir();
			}
			continue;
		}

		if is_dir {
			stack.truncate(depth);
			stack.push(cursor);
		}

		let skipped = record(&mut outcome, entry.path(), is_dir, visit);
		if skipped && is_dir {
			iter.skip_current_dir();
		}
	}

	outcome
}

/// Runs the visitor and files the path into the right set; returns whether to prune.
fn record(
	outcome: &mut TraversalOutcome,
	path: &Path,
	is_dir: bool,
	visit: &mut VisitFn<'_>,
) -> bool {
	match visit(path, is_dir) {
		Ok(Visit::Continue) => {
			outcome.visited.insert(path.to_owned());
			false
		}
		Ok(Visit::Skip) => {
			outcome.ignored.insert(path.to_owned());
			true
		}
		Err(err) => {
			outcome.errored.insert(path.to_owned(), err);
			true
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fixture() -> (tempfile::TempDir, PathBuf) {
		let dir = tempfile::tempdir().unwrap();
		let root = dunce::canonicalize(dir.path()).unwrap();
		std::fs::create_dir_all(root.join("src/nested")).unwrap();
		std::fs::create_dir_all(root.join("static")).unwrap();
		std::fs::create_dir_all(root.join(".git/objects")).unwrap();
		std::fs::write(root.join("src/main.go"), "package main\n").unwrap();
		std::fs::write(root.join("src/nested/util.go"), "package nested\n").unwrap();
		std::fs::write(root.join("static/style.css"), "body {}\n").unwrap();
		std::fs::write(root.join(".git/objects/abc"), "blob").unwrap();
		(dir, root)
	}

	fn accept_all(root: &Path) -> FilterTree {
		let mut filter = FilterTree::new();
		filter.accept_path(root);
		filter.reject_glob(".git").unwrap();
		filter
	}

	#[test]
	fn sets_are_disjoint_and_pruned() {
		let (_guard, root) = fixture();
		let filter = accept_all(&root);

		let outcome = traverse(&root, &filter, &mut |_, _| Ok(Visit::Continue));

		assert!(outcome.visited.contains(&root.join("src/main.go")));
		assert!(outcome.visited.contains(&root.join("src/nested/util.go")));
		assert!(outcome.visited.contains(&root.join("static/style.css")));
		assert!(outcome.ignored.contains(&root.join(".git")));
		// pruned: nothing below .git shows up anywhere
		let below_git = root.join(".git/objects");
		assert!(!outcome.visited.contains(&below_git));
		assert!(!outcome.ignored.contains(&below_git));
		assert!(outcome.errored.is_empty());

		for path in &outcome.visited {
			assert!(!outcome.ignored.contains(path));
		}
	}

	#[test]
	fn visitor_skip_records_ignored() {
		let (_guard, root) = fixture();
		let filter = accept_all(&root);

		let skip_static = root.join("static");
		let outcome = traverse(&root, &filter, &mut |path, _| {
			if path == skip_static {
				Ok(Visit::Skip)
			} else {
				Ok(Visit::Continue)
			}
		});

		assert!(outcome.ignored.contains(&skip_static));
		assert!(!outcome.visited.contains(&root.join("static/style.css")));
	}

	#[test]
	fn file_root_is_visited_once() {
		let (_guard, root) = fixture();
		let filter = accept_all(&root);

		let file = root.join("src/main.go");
		let outcome = traverse(&file, &filter, &mut |path, is_dir| {
			assert!(!is_dir);
			assert_eq!(path, file);
			Ok(Visit::Continue)
		});

		assert_eq!(outcome.visited.len(), 1);
		assert!(outcome.visited.contains(&file));
	}

	#[test]
	fn missing_root_is_errored() {
		let filter = FilterTree::new();
		let missing = Path::new("/definitely/not/here");
		let outcome = traverse(missing, &filter, &mut |_, _| Ok(Visit::Continue));
		assert!(outcome.errored.contains_key(missing));
		assert!(outcome.visited.is_empty());
	}
}
