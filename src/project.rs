//! Knowledge about the supervised project: its layout on disk, its source digest, and the
//! external build and run commands.

#[doc(inline)]
pub use builder::*;
#[doc(inline)]
pub use layout::*;
#[doc(inline)]
pub use runner::*;

pub mod digest;

mod builder;
mod layout;
mod logging;
mod runner;
