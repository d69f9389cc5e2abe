//! shipwright — build, launch and enter a single-service container image.
//!
//! The launcher half runs on the host: it validates the build context, renders
//! the Dockerfile from `.shipwright.yaml`, builds and verifies the image, then
//! starts one container with a fixed port mapping, an environment file and a
//! read-only source mount. The entrypoint half runs as PID 1 inside the
//! container and replaces itself with the server process.

pub mod config;
pub mod context;
pub mod docker;
pub mod entrypoint;
pub mod error;
pub mod image;
pub mod launcher;

pub use config::Config;
pub use error::{HarnessError, RunFailure, Step};
