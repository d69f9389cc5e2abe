use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use super::commands::{build_command, inspect_command, run_command, stop_command};
use super::{health, preflight};
use super::types::{BuildReport, LaunchInput, RunReport};
use crate::config::{Config, EntrypointMode};
use crate::context;
use crate::docker::{self, DockerClient};
use crate::error::{HarnessError, RunFailure};
use crate::image;

/// Build the image, then run a container from it. The first failing step
/// aborts the sequence.
pub fn up(client: &mut dyn DockerClient, input: &LaunchInput) -> Result<(BuildReport, RunReport)> {
    up_with(client, input, |_| {})
}

/// [`up`], calling `before_run` once the image is built and verified.
pub fn up_with(
    client: &mut dyn DockerClient,
    input: &LaunchInput,
    before_run: impl FnOnce(&Config),
) -> Result<(BuildReport, RunReport)> {
    let build = build(client, &input.config, &input.context_dir)?;
    before_run(&input.config);
    let run = run(client, &input.config, &input.context_dir, &input.forwarded)?;
    Ok((build, run))
}

/// Validate the context, render the build description, `docker build` and
/// verify the resulting image.
pub fn build(client: &mut dyn DockerClient, cfg: &Config, dir: &Path) -> Result<BuildReport> {
    let ctx = context::inspect(dir, cfg)?;
    info!(
        context = %ctx.root.display(),
        sources = ctx.sources.len(),
        "build context ok"
    );

    if cfg.entrypoint == EntrypointMode::Native && !ctx.root.join(image::NATIVE_BINARY).is_file() {
        return Err(HarnessError::InvalidConfig(format!(
            "native entrypoint needs a linux `{}` binary in the build context",
            image::NATIVE_BINARY
        ))
        .into());
    }

    docker::ensure_available(client)?;

    let rendered = image::write(&ctx.root, cfg)?;
    for path in &rendered {
        info!(file = %path.display(), "rendered");
    }

    info!(image = %cfg.image, "building image");
    let result = client.execute(&build_command(cfg, &ctx.root, &ctx.dockerfile()))?;
    if !result.success {
        return Err(HarnessError::BuildFailed {
            code: result.code(),
        }
        .into());
    }

    let inspected = client.execute(&inspect_command(cfg))?;
    if !inspected.success {
        return Err(HarnessError::ImageContract(format!(
            "{} was built but cannot be inspected",
            cfg.image
        ))
        .into());
    }
    let info = docker::parse_image_inspect(&inspected.stdout)?;
    if info.runs_as_root() {
        return Err(HarnessError::ImageContract(format!(
            "image user is {:?}, expected {}",
            info.user, cfg.user
        ))
        .into());
    }
    if !info.exposes(cfg.port) {
        return Err(HarnessError::ImageContract(format!(
            "image exposes {:?}, expected {}/tcp",
            info.exposed_ports, cfg.port
        ))
        .into());
    }

    info!(image = %cfg.image, id = %info.id, "image built");
    Ok(BuildReport {
        image: cfg.image.clone(),
        image_id: info.id,
        rendered,
    })
}

/// Start one container from the configured image.
///
/// Pre-flight checks (environment file, image, host port) run before
/// `docker run`, so a refused run leaves no container behind.
pub fn run(
    client: &mut dyn DockerClient,
    cfg: &Config,
    dir: &Path,
    forwarded: &[String],
) -> Result<RunReport> {
    docker::ensure_available(client)?;

    let root = context::resolve_root(dir)?;
    let env_file = preflight::env_file(&root, &cfg.env_file)?;

    let inspected = client.execute(&inspect_command(cfg))?;
    if !inspected.success {
        let err = match docker::classify_run_failure(&inspected.stderr) {
            RunFailure::NoSuchImage => HarnessError::ImageMissing(cfg.image.clone()),
            _ => {
                warn!(image = %cfg.image, "image inspect failed: {}", inspected.stderr.trim());
                HarnessError::RunFailed {
                    code: inspected.code(),
                    reason: RunFailure::Other,
                }
            }
        };
        return Err(err.into());
    }
    preflight::port_available(cfg.port)?;

    info!(
        image = %cfg.image,
        port = cfg.port,
        container = %cfg.container_name(),
        "starting container"
    );
    let result = client.execute(&run_command(cfg, &root, &env_file, forwarded))?;
    if !result.success {
        let code = result.code();
        let reason = match code {
            125 => docker::classify_run_failure(&result.stderr),
            126 | 127 => RunFailure::Other,
            _ => RunFailure::ContainerExited,
        };
        return Err(HarnessError::RunFailed { code, reason }.into());
    }

    if !cfg.detach {
        info!("container exited");
        return Ok(RunReport::Exited);
    }

    let container_id = result.stdout.trim().to_string();
    info!(id = %short_id(&container_id), path = %cfg.health_path, "container started, waiting for health");
    let timeout = Duration::from_secs(cfg.ready_timeout);
    let ready_after = health::wait_until_healthy(cfg.port, &cfg.health_path, timeout)
        .inspect_err(|_| {
            warn!(
                container = %cfg.container_name(),
                "server not healthy; see `docker logs` for the container"
            )
        })?;
    info!(port = cfg.port, ?ready_after, "server healthy");

    Ok(RunReport::Detached {
        container_id,
        ready_after,
    })
}

/// Stop the configured container. `--rm` removes it once stopped.
pub fn stop(client: &mut dyn DockerClient, cfg: &Config) -> Result<()> {
    docker::ensure_available(client)?;
    info!(container = %cfg.container_name(), "stopping container");
    let result = client.execute(&stop_command(cfg))?;
    if !result.success {
        return Err(HarnessError::RunFailed {
            code: result.code(),
            reason: RunFailure::Other,
        }
        .into());
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
