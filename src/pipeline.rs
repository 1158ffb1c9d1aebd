//! The four long-lived pipeline stages and the signal listener.
//!
//! Each stage is one async worker owning its mutable state; stages communicate only through
//! typed queues and stop together through one shared cancellation token.

pub mod batch;
pub mod build;
pub mod run;
pub mod signal;
pub mod watch;
