//! Error types for critical and runtime errors.

#[doc(inline)]
pub use critical::*;
#[doc(inline)]
pub use runtime::*;

mod critical;
mod runtime;
