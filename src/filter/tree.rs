use std::{
	collections::HashMap,
	ffi::{OsStr, OsString},
	path::{Path, PathBuf, MAIN_SEPARATOR_STR},
};

use crate::{error::RuntimeError, paths};

use super::SegmentGlob;

#[derive(Debug, Default)]
struct Node {
	children: HashMap<OsString, Node>,
	accept: bool,
	reject: bool,
}

/// A prefix-trie of accept/reject path rules plus flat accept/reject segment-glob lists.
///
/// Insertion order is irrelevant: precedence comes entirely from the evaluation rules. At each
/// segment, parent inheritance is applied first, then the node's path rules (reject, then
/// accept), then the reject globs, then the accept globs, so that later steps override earlier
/// ones. An empty tree rejects everything.
#[derive(Debug, Default)]
pub struct FilterTree {
	root: Node,
	accept_globs: Vec<SegmentGlob>,
	reject_globs: Vec<SegmentGlob>,
}

impl FilterTree {
	/// Creates an empty filter tree.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests that the path and its descendants be accepted.
	pub fn accept_path(&mut self, path: &Path) {
		node_at(&mut self.root, path).accept = true;
	}

	/// Requests that the path and its descendants be rejected.
	pub fn reject_path(&mut self, path: &Path) {
		node_at(&mut self.root, path).reject = true;
	}

	/// Requests that paths containing a segment matching the pattern be accepted.
	pub fn accept_glob(&mut self, pattern: &str) -> Result<(), RuntimeError> {
		self.accept_globs.push(SegmentGlob::new(pattern)?);
		Ok(())
	}

	/// Requests that paths containing a segment matching the pattern be rejected.
	pub fn reject_glob(&mut self, pattern: &str) -> Result<(), RuntimeError> {
		self.reject_globs.push(SegmentGlob::new(pattern)?);
		Ok(())
	}

	/// Single-shot decision for a path.
	#[must_use]
	pub fn is_accepted(&self, path: &Path) -> bool {
		let mut cursor = self.cursor();
		for segment in paths::segments(path) {
			cursor = cursor.navigate(segment);
		}
		cursor.is_accepted()
	}

	/// An incremental cursor positioned at the filesystem root.
	///
	/// Traversal navigates the cursor one segment at a time instead of re-descending the trie
	/// for every file.
	#[must_use]
	pub fn cursor(&self) -> FilterCursor<'_> {
		let mut accepted = false;
		if self.root.reject {
			accepted = false;
		}
		if self.root.accept {
			accepted = true;
		}
		FilterCursor {
			tree: self,
			node: Some(&self.root),
			accepted,
		}
	}

	/// The minimal set of accepted roots.
	///
	/// Every accepted path descends from exactly one returned root, and no returned root
	/// descends from another: a trie node is emitted iff it is accepted and its parent is not.
	#[must_use]
	pub fn root_paths(&self) -> Vec<PathBuf> {
		let mut found = Vec::new();
		let base = PathBuf::from(MAIN_SEPARATOR_STR);
		self.find_roots(&mut found, &base, self.cursor());
		found.sort();
		found
	}

	fn find_roots(&self, found: &mut Vec<PathBuf>, base: &Path, cursor: FilterCursor<'_>) {
		let Some(node) = cursor.node else { return };
		for name in node.children.keys() {
			let child = cursor.navigate(name);
			let path = base.join(name);
			if child.is_accepted() && !cursor.is_accepted() {
				found.push(path.clone());
			}
			self.find_roots(found, &path, child);
		}
	}
}

fn node_at<'n>(root: &'n mut Node, path: &Path) -> &'n mut Node {
	let mut node = root;
	for segment in paths::segments(path) {
		node = node.children.entry(segment.to_owned()).or_default();
	}
	node
}

/// A position inside a [`FilterTree`], carrying the verdict inherited so far.
#[derive(Clone, Copy, Debug)]
pub struct FilterCursor<'t> {
	tree: &'t FilterTree,
	node: Option<&'t Node>,
	accepted: bool,
}

impl<'t> FilterCursor<'t> {
	/// Steps down one path segment, producing the cursor for the child.
	#[must_use]
	pub fn navigate(&self, segment: &OsStr) -> FilterCursor<'t> {
		let node = self.node.and_then(|node| node.children.get(segment));
		let mut accepted = self.accepted;

		if let Some(node) = node {
			if node.reject {
				accepted = false;
			}
			if node.accept {
				accepted = true;
			}
		}

		let segment = segment.to_string_lossy();
		if self.tree.reject_globs.iter().any(|g| g.matches(&segment)) {
			accepted = false;
		}
		if self.tree.accept_globs.iter().any(|g| g.matches(&segment)) {
			accepted = true;
		}

		FilterCursor {
			tree: self.tree,
			node,
			accepted,
		}
	}

	/// The verdict at the current position.
	#[must_use]
	pub fn is_accepted(&self) -> bool {
		self.accepted
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn p(path: &str) -> &Path {
		Path::new(path)
	}

	// The layered rule set exercised throughout: user homes accepted, one user rejected,
	// documents rejected but memos re-accepted below them, plus glob overrides both ways.
	fn layered() -> FilterTree {
		let mut tree = FilterTree::new();
		tree.accept_path(p("/users"));
		tree.reject_path(p("/users/max"));
		tree.reject_path(p("/users/john/documents"));
		tree.accept_path(p("/users/john/documents/memos"));
		tree.reject_path(p("/users/john/documents/memos/travel/japan"));
		tree.accept_glob("*important*").unwrap();
		tree.reject_glob("*_test.go").unwrap();
		tree
	}

	#[test]
	fn empty_tree_rejects_everything() {
		let tree = FilterTree::new();
		assert!(!tree.is_accepted(p("/")));
		assert!(!tree.is_accepted(p("/users")));
		assert!(!tree.is_accepted(p("/users/jane/notes.txt")));
	}

	#[test]
	fn acceptance_inherits_down() {
		let tree = layered();
		assert!(tree.is_accepted(p("/users/jane")));
		assert!(tree.is_accepted(p("/users/jane/deeply/nested/file.txt")));
	}

	#[test]
	fn rejection_inherits_down() {
		let tree = layered();
		assert!(!tree.is_accepted(p("/users/max")));
		assert!(!tree.is_accepted(p("/users/max/documents")));
	}

	#[test]
	fn sibling_of_rejected_path_inherits() {
		let mut tree = FilterTree::new();
		tree.accept_path(p("/a"));
		tree.reject_path(p("/a/b"));
		assert!(!tree.is_accepted(p("/a/b/c")));
		assert!(tree.is_accepted(p("/a/b_other")));
	}

	#[test]
	fn descendant_accept_beats_ancestor_reject() {
		let tree = layered();
		assert!(tree.is_accepted(p("/users/john/documents/memos/work")));
		assert!(!tree.is_accepted(p("/users/john/documents/reports")));
		assert!(!tree.is_accepted(p("/users/john/documents/memos/travel/japan/tokyo")));
	}

	#[test]
	fn reject_glob_overrides_inherited_accept() {
		let tree = layered();
		assert!(!tree.is_accepted(p("/users/jane/data_test.go")));
	}

	#[test]
	fn accept_glob_overrides_rejected_subtree() {
		let tree = layered();
		assert!(tree.is_accepted(p("/users/max/some_important_items")));
	}

	#[test]
	fn accept_glob_beats_reject_glob_at_the_same_segment() {
		let tree = layered();
		assert!(tree.is_accepted(p("/users/max/some_important_items_test.go")));
	}

	#[test]
	fn glob_alone_accepts_outside_any_path_rule() {
		let mut tree = FilterTree::new();
		tree.accept_glob("*.go").unwrap();
		assert!(tree.is_accepted(p("/x/main.go")));
		assert!(!tree.is_accepted(p("/x/main.rs")));
	}

	#[test]
	fn root_is_not_accepted_without_an_explicit_rule() {
		let tree = layered();
		assert!(!tree.is_accepted(p("/")));

		let mut explicit = FilterTree::new();
		explicit.accept_path(p("/"));
		assert!(explicit.is_accepted(p("/")));
	}

	#[test]
	fn cursor_matches_single_shot_decisions() {
		let tree = layered();
		let cursor = tree
			.cursor()
			.navigate(OsStr::new("users"))
			.navigate(OsStr::new("john"))
			.navigate(OsStr::new("documents"));
		assert!(!cursor.is_accepted());
		let memos = cursor.navigate(OsStr::new("memos"));
		assert!(memos.is_accepted());
		assert_eq!(
			memos.navigate(OsStr::new("work")).is_accepted(),
			tree.is_accepted(p("/users/john/documents/memos/work"))
		);
	}

	#[test]
	fn root_paths_are_minimal() {
		let tree = layered();
		assert_eq!(
			tree.root_paths(),
			vec![
				PathBuf::from("/users"),
				PathBuf::from("/users/john/documents/memos"),
			]
		);
	}

	#[test]
	fn root_paths_of_empty_tree_are_empty() {
		assert!(FilterTree::new().root_paths().is_empty());
	}

	#[test]
	fn invalid_glob_surfaces_at_insertion() {
		let mut tree = FilterTree::new();
		assert!(tree.accept_glob("[").is_err());
		assert!(tree.reject_glob("[").is_err());
	}
}
