use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// Input to the launcher.
pub struct LaunchInput {
    pub config: Config,
    pub context_dir: PathBuf,
    /// Arguments appended to `docker run`, delivered to the server.
    pub forwarded: Vec<String>,
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub image: String,
    pub image_id: String,
    /// Generated files that were (re)written before the build.
    pub rendered: Vec<PathBuf>,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// Foreground run; the container has exited cleanly.
    Exited,
    /// Detached run; the container is up and its health endpoint answers 2xx.
    Detached {
        container_id: String,
        ready_after: Duration,
    },
}
