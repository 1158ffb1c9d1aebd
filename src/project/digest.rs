//! Content fingerprint over the source-file set.
//!
//! The digest is an invalidation hint, not a build attestation: it hashes file *metadata*
//! (path, mtime, size), so an unchanged digest means the inputs of the last recorded build are
//! still in place and the initial rebuild can be skipped.

use std::{
	fmt::Write as _,
	fs,
	path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::RuntimeError;

/// Mtimes are truncated to whole seconds so that copy operations which drop sub-second
/// precision (image layers, some network filesystems) do not invalidate the digest.
const MTIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Computes the digest over the given source files.
///
/// Files are processed in lexicographic order of absolute path regardless of input order; for
/// each, `len(path) ‖ path ‖ mtime ‖ size` is fed to SHA-256 with no separators. The result is
/// the lowercase hex form of the 32-byte digest.
pub fn compute<'p, I>(files: I) -> Result<String, RuntimeError>
where
	I: IntoIterator<Item = &'p PathBuf>,
{
	let mut sorted: Vec<&PathBuf> = files.into_iter().collect();
	sorted.sort();

	let mut hasher = Sha256::new();
	for path in sorted {
		let meta = fs::metadata(path).map_err(|err| RuntimeError::IoError {
			about: "reading source file metadata",
			err,
		})?;
		let modified = meta.modified().map_err(|err| RuntimeError::IoError {
			about: "reading source file mtime",
			err,
		})?;
		let mtime: DateTime<Utc> = modified.into();

		let path = path.to_string_lossy();
		hasher.update(path.len().to_string());
		hasher.update(path.as_bytes());
		hasher.update(mtime.format(MTIME_FORMAT).to_string());
		hasher.update(meta.len().to_string());
	}

	let digest = hasher.finalize();
	let mut hex = String::with_capacity(digest.len() * 2);
	for byte in digest {
		write!(hex, "{byte:02x}").expect("writing to a String cannot fail");
	}
	Ok(hex)
}

/// Reads the digest string from a file, verbatim.
pub fn read_digest(path: &Path) -> Result<String, std::io::Error> {
	fs::read_to_string(path)
}

/// Stores the digest string into a file, verbatim: no surrounding whitespace, no newline.
pub fn write_digest(path: &Path, digest: &str) -> Result<(), std::io::Error> {
	fs::write(path, digest)
}
