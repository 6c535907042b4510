//! Job system façade -- owns every pool, the in-flight registry and the
//! watchdog.
//!
//! Split into focused submodules:
//! - `core`: JobSystem struct, constructor, accessors and shutdown
//! - `submit`: job submission, the fluent builder and `Submitter`
//! - `watchdog`: starvation detection and the background watchdog thread

mod core;
mod submit;
mod watchdog;
#[cfg(test)]
mod tests;

pub use self::core::{JobSystem, Submitter};
pub use self::submit::JobBuilder;
pub use self::watchdog::{Blocker, BlockerState, StarvationReport};
