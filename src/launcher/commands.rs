use std::path::Path;

use crate::config::Config;
use crate::docker::DockerCommand;

/// Build a `docker build` command for the context.
pub fn build_command(cfg: &Config, root: &Path, dockerfile: &Path) -> DockerCommand {
    DockerCommand::new([
        "build".to_string(),
        "--tag".into(),
        cfg.image.clone(),
        "--file".into(),
        dockerfile.display().to_string(),
        root.display().to_string(),
    ])
}

/// Build a quiet `docker image inspect` command for the configured tag.
pub fn inspect_command(cfg: &Config) -> DockerCommand {
    DockerCommand::new(["image", "inspect", cfg.image.as_str()]).quiet()
}

/// Build the `docker run` command.
///
/// Publishes `port:port`, injects the environment file, bind-mounts the
/// context read-only over the application root and removes the container on
/// exit. `forwarded` is appended after the image and reaches the entrypoint.
pub fn run_command(cfg: &Config, root: &Path, env_file: &Path, forwarded: &[String]) -> DockerCommand {
    let mut args = vec![
        "run".to_string(),
        "--rm".into(),
        "--name".into(),
        cfg.container_name(),
    ];
    if cfg.detach {
        args.push("--detach".into());
    }
    args.extend([
        "--publish".into(),
        format!("{0}:{0}", cfg.port),
        "--env-file".into(),
        env_file.display().to_string(),
        "--volume".into(),
        format!("{}:{}:ro", root.display(), cfg.app_root),
    ]);
    args.push(cfg.image.clone());
    args.extend(forwarded.iter().cloned());

    let cmd = DockerCommand::new(args);
    // Detached runs print only the container id, which the launcher reports itself.
    if cfg.detach { cmd.quiet() } else { cmd }
}

/// Build a `docker stop` command for the configured container name.
pub fn stop_command(cfg: &Config) -> DockerCommand {
    DockerCommand::new(["stop".to_string(), cfg.container_name()])
}
