//! Utilities for absolute paths and their segment form.

use std::{
	ffi::OsStr,
	path::{Component, Path, PathBuf},
};

use normalize_path::NormalizePath;

use crate::error::RuntimeError;

/// Converts a path to absolute, normalized form.
///
/// Existing paths are canonicalised (symlinks resolved, `..` collapsed against the real tree);
/// paths that do not exist yet are cleaned lexically instead, so that event paths for freshly
/// deleted files still resolve.
pub fn absolutize(path: &Path) -> Result<PathBuf, RuntimeError> {
	let absolute = if path.is_absolute() {
		path.to_owned()
	} else {
		std::env::current_dir()
			.map_err(|err| RuntimeError::PathAbsolutize {
				path: path.to_owned(),
				err,
			})?
			.join(path)
	};

	Ok(dunce::canonicalize(&absolute).unwrap_or_else(|_| absolute.normalize()))
}

/// The name segments of a path, root and prefix components folded away.
///
/// This is the key sequence used by the filter trie: `/a/b/c.go` yields `a`, `b`, `c.go`.
pub fn segments(path: &Path) -> impl Iterator<Item = &OsStr> {
	path.components().filter_map(|component| match component {
		Component::Normal(segment) => Some(segment),
		Component::Prefix(prefix) => Some(prefix.as_os_str()),
		_ => None,
	})
}

/// The conventional digest file location for a binary: `<binary>.dig`.
#[must_use]
pub fn digest_path_for(binary: &Path) -> PathBuf {
	let mut file = binary.as_os_str().to_owned();
	file.push(".dig");
	PathBuf::from(file)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn segments_skip_the_root() {
		let segs: Vec<_> = segments(Path::new("/users/john/main.go")).collect();
		assert_eq!(segs, ["users", "john", "main.go"]);
	}

	#[test]
	fn segments_of_the_root_are_empty() {
		assert_eq!(segments(Path::new("/")).count(), 0);
	}

	#[test]
	fn absolutize_cleans_nonexistent_paths() {
		let path = absolutize(Path::new("/definitely/not/../here/app.go")).unwrap();
		assert_eq!(path, PathBuf::from("/definitely/here/app.go"));
	}

	#[test]
	fn absolutize_anchors_relative_paths() {
		let path = absolutize(Path::new("some-file.go")).unwrap();
		assert!(path.is_absolute());
		assert!(path.ends_with("some-file.go"));
	}

	#[test]
	fn digest_path_appends_extension() {
		assert_eq!(
			digest_path_for(Path::new("/out/app")),
			PathBuf::from("/out/app.dig")
		);
		assert_eq!(
			digest_path_for(Path::new("/out/app.exe")),
			PathBuf::from("/out/app.exe.dig")
		);
	}
}
