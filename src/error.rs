use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The harness stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Run,
    Startup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => f.write_str("build"),
            Self::Run => f.write_str("run"),
            Self::Startup => f.write_str("startup"),
        }
    }
}

/// Why `docker run` refused to start the container, as read from its stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFailure {
    PortAllocated,
    NameConflict,
    NoSuchImage,
    EnvFile,
    /// Docker started the container and the server exited non-zero.
    ContainerExited,
    Other,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortAllocated => f.write_str("host port already allocated"),
            Self::NameConflict => f.write_str("container name already in use"),
            Self::NoSuchImage => f.write_str("image not found"),
            Self::EnvFile => f.write_str("environment file unreadable"),
            Self::ContainerExited => f.write_str("server exited"),
            Self::Other => f.write_str("container failed"),
        }
    }
}

/// Tagged failures of the build/run/startup sequence. All of them are fatal.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("docker is not available: {0}")]
    DockerUnavailable(String),

    #[error("dependency manifest missing or unreadable: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("build context has no application source besides {0}")]
    NoApplicationSource(String),

    #[error("docker build failed (exit {code})")]
    BuildFailed { code: i32 },

    #[error("built image violates its contract: {0}")]
    ImageContract(String),

    #[error("environment file unreadable: {}", .0.display())]
    EnvFileUnreadable(PathBuf),

    #[error("image {0} does not exist; run `shipwright build` first")]
    ImageMissing(String),

    #[error("host port {0} is already in use")]
    PortInUse(u16),

    #[error("docker run failed (exit {code}): {reason}")]
    RunFailed { code: i32, reason: RunFailure },

    #[error("server on port {port} not healthy at {path} after {secs}s")]
    NotReady { port: u16, path: String, secs: u64 },

    #[error("generated files drifted from config: {0}")]
    Drift(String),

    #[error(
        "{} was not generated by shipwright; move its settings into .shipwright.yaml, \
         delete it and run `shipwright render`",
        .0.display()
    )]
    NotGenerated(PathBuf),

    #[error("cannot enter application root {}: {source}", .path.display())]
    AppRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start server `{program}`: {source}")]
    ServerExec {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub fn step(&self) -> Step {
        match self {
            Self::InvalidConfig(_)
            | Self::DockerUnavailable(_)
            | Self::ManifestMissing(_)
            | Self::NoApplicationSource(_)
            | Self::BuildFailed { .. }
            | Self::ImageContract(_)
            | Self::Drift(_)
            | Self::NotGenerated(_) => Step::Build,
            Self::EnvFileUnreadable(_)
            | Self::ImageMissing(_)
            | Self::PortInUse(_)
            | Self::RunFailed { .. }
            | Self::NotReady { .. } => Step::Run,
            Self::AppRoot { .. } | Self::ServerExec { .. } => Step::Startup,
        }
    }

    /// Process exit code to report. Docker's own code is propagated when there is one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BuildFailed { code } | Self::RunFailed { code, .. } => *code,
            Self::ServerExec { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => 127,
                std::io::ErrorKind::PermissionDenied => 126,
                _ => 1,
            },
            _ => 1,
        }
    }
}
