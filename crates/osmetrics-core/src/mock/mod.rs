//! Test doubles: an in-memory filesystem, a scripted executor, canned `top`
//! and `/proc` content, and a couple of trivial definitions.

mod definitions;
mod executor;
mod filesystem;
mod scenarios;

pub use definitions::{CommandMetric, NotAnOsMetric};
pub use executor::MockExecutor;
pub use filesystem::MockFs;
pub use scenarios::{LINUX_TOP_OUTPUT, MAC_TOP_OUTPUT};
