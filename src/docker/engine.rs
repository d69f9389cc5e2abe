use anyhow::Result;

use super::run;
use super::types::{ContainerResult, DockerCommand};
use crate::error::HarnessError;

/// Seam between the launcher and the docker CLI.
pub trait DockerClient {
    fn execute(&mut self, cmd: &DockerCommand) -> Result<ContainerResult>;
}

/// Runs commands against the real `docker` binary.
#[derive(Debug, Default)]
pub struct DockerCli;

impl DockerClient for DockerCli {
    fn execute(&mut self, cmd: &DockerCommand) -> Result<ContainerResult> {
        tracing::debug!(command = %cmd, "exec");
        run::execute(cmd)
    }
}

/// Verify that the Docker daemon is reachable.
pub fn ensure_available(client: &mut dyn DockerClient) -> Result<()> {
    let cmd = DockerCommand::new(["version", "--format", "{{.Server.Version}}"]).quiet();
    let result = client
        .execute(&cmd)
        .map_err(|e| HarnessError::DockerUnavailable(format!("{e:#}")))?;

    if !result.success {
        let detail = result.stderr.lines().last().unwrap_or("daemon is not running");
        return Err(HarnessError::DockerUnavailable(format!(
            "{} (exit {})",
            detail.trim(),
            result.code()
        ))
        .into());
    }
    tracing::debug!(server = result.stdout.trim(), "docker daemon reachable");
    Ok(())
}
