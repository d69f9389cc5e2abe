pub mod commands;
pub mod health;
pub mod orchestrator;
pub mod preflight;
mod types;

pub use orchestrator::{build, run, stop, up, up_with};
pub use types::{BuildReport, LaunchInput, RunReport};
