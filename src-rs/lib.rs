//! Automation core for capturing per-keystroke search results from a mirrored
//! phone screen: window-relative geometry, the calibration profile, the app
//! launch orchestrator and the calibration workflow.

pub mod bridge;
pub mod capture;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod geometry;
pub mod orchestrator;
pub mod overlay;
pub mod profile;
pub mod prompt;
pub mod util;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{ErrorKind, MirrorError, MirrorResult};
