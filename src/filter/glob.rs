use globset::{Glob, GlobMatcher};

use crate::error::RuntimeError;

/// The prefix that marks a rule entry as a segment glob rather than a literal path.
pub const GLOB_MARKER: &str = "*/";

/// Whether the entry is a candidate to be a glob, i.e. carries the glob marker.
///
/// A `true` result does not mean the pattern itself is valid; that is only known once
/// [`SegmentGlob::new`] has parsed it.
#[must_use]
pub fn is_glob(entry: &str) -> bool {
	entry.starts_with(GLOB_MARKER)
}

/// The glob pattern of a marked entry, marker stripped.
#[must_use]
pub fn pattern(entry: &str) -> &str {
	entry.strip_prefix(GLOB_MARKER).unwrap_or(entry)
}

/// Prepends the glob marker to a pattern.
#[must_use]
pub fn glob(pattern: &str) -> String {
	format!("{GLOB_MARKER}{pattern}")
}

/// A shell-style pattern evaluated against a single path segment.
#[derive(Clone, Debug)]
pub struct SegmentGlob {
	matcher: GlobMatcher,
}

impl SegmentGlob {
	/// Compiles a pattern (without the marker). Bad syntax surfaces here, never at match time.
	pub fn new(pattern: &str) -> Result<Self, RuntimeError> {
		let glob = Glob::new(pattern).map_err(|err| RuntimeError::GlobParse {
			glob: pattern.to_owned(),
			err,
		})?;
		Ok(Self {
			matcher: glob.compile_matcher(),
		})
	}

	/// Whether the segment matches this pattern.
	#[must_use]
	pub fn matches(&self, segment: &str) -> bool {
		self.matcher.is_match(segment)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn marker_detection() {
		assert!(is_glob("*/node_modules"));
		assert!(is_glob("*/*.go"));
		assert!(!is_glob("./src"));
		assert!(!is_glob("/abs/path"));
		assert!(!is_glob("*.go"));
	}

	#[test]
	fn marker_strip_and_add() {
		assert_eq!(pattern("*/*.go"), "*.go");
		assert_eq!(pattern("plain"), "plain");
		assert_eq!(glob(".git"), "*/.git");
	}

	#[test]
	fn segment_matching() {
		let star = SegmentGlob::new("*_test.go").unwrap();
		assert!(star.matches("main_test.go"));
		assert!(star.matches("some_important_items_test.go"));
		assert!(!star.matches("main.go"));

		let infix = SegmentGlob::new("*important*").unwrap();
		assert!(infix.matches("some_important_items"));
		assert!(!infix.matches("mundane"));
	}

	#[test]
	fn invalid_pattern_errors_at_construction() {
		let err = SegmentGlob::new("[").unwrap_err();
		assert!(matches!(err, RuntimeError::GlobParse { .. }));
	}
}
