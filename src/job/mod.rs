//! Request-scoped transformation jobs
//!
//! A job lives exactly as long as the HTTP request that created it. The
//! coordinator stages inputs, runs the transform, publishes the result and
//! always cleans up after itself.

mod coordinator;
mod types;

pub use coordinator::{validate, JobCoordinator};
pub use types::*;
