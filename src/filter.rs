//! Layered include/exclude decisions over absolute paths.
//!
//! A [`FilterTree`] combines a prefix-trie of accept/reject path rules with flat lists of
//! accept/reject segment globs. Decisions walk the path segment by segment, inheriting the
//! verdict from the parent and letting deeper rules override shallower ones.

#[doc(inline)]
pub use glob::*;
#[doc(inline)]
pub use tree::*;

mod glob;
mod tree;
