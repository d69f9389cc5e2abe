use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::config::{Config, EntrypointMode};

pub const DOCKERFILE: &str = "Dockerfile";
pub const ENTRYPOINT_SCRIPT: &str = "docker-entrypoint.sh";
pub const DOCKERIGNORE: &str = ".dockerignore";
/// Binary copied from the build context in native entrypoint mode.
pub const NATIVE_BINARY: &str = "shipwright";

const BIN_DIR: &str = "/usr/local/bin";

const HEADER: &str = "Generated by shipwright from .shipwright.yaml; edit that file and run `shipwright render`.";

/// A file the harness writes into the build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: &'static str,
    pub contents: String,
    pub executable: bool,
}

/// Everything `render` would write for this config, in a stable order.
pub fn generated_files(cfg: &Config) -> Result<Vec<GeneratedFile>> {
    let mut files = vec![GeneratedFile {
        name: DOCKERFILE,
        contents: dockerfile(cfg)?,
        executable: false,
    }];
    if cfg.entrypoint == EntrypointMode::Script {
        files.push(GeneratedFile {
            name: ENTRYPOINT_SCRIPT,
            contents: entrypoint_script(cfg)?,
            executable: true,
        });
    }
    Ok(files)
}

/// Whether `text` carries the generated-file header, i.e. the harness owns it.
pub fn is_generated(text: &str) -> bool {
    text.lines().take(2).any(|l| l == format!("# {HEADER}"))
}

/// Render the Dockerfile.
///
/// Layer order: base, manifest, install, code, user + ownership, `USER`,
/// port, entrypoint. The manifest is copied alone so that the install layer is
/// reused while only application code changes.
pub fn dockerfile(cfg: &Config) -> Result<String> {
    let app_root = cfg.app_root.trim_end_matches('/');
    let app_root = if app_root.is_empty() { "/" } else { app_root };
    let user = &cfg.user;

    let mut out = String::new();
    writeln!(out, "# {HEADER}")?;
    writeln!(out, "FROM {}", cfg.base_image)?;
    writeln!(out)?;
    writeln!(out, "WORKDIR {app_root}")?;
    writeln!(out)?;
    writeln!(out, "COPY {0} ./{0}", cfg.manifest)?;
    writeln!(out, "RUN {}", cfg.install)?;
    writeln!(out)?;
    writeln!(out, "COPY . .")?;

    let (entry_src, entry_path, entrypoint) = match cfg.entrypoint {
        EntrypointMode::Script => {
            let path = format!("{BIN_DIR}/{ENTRYPOINT_SCRIPT}");
            (ENTRYPOINT_SCRIPT, path.clone(), json_array(&[path])?)
        }
        EntrypointMode::Native => {
            let path = format!("{BIN_DIR}/{NATIVE_BINARY}");
            (
                NATIVE_BINARY,
                path.clone(),
                json_array(&[path, "entrypoint".to_string()])?,
            )
        }
    };
    writeln!(out, "COPY {entry_src} {entry_path}")?;
    writeln!(out)?;
    writeln!(
        out,
        "RUN useradd --no-log-init --create-home --uid {} {user} \\",
        cfg.uid
    )?;
    writeln!(out, "    && chmod 0755 {entry_path} \\")?;
    writeln!(out, "    && chown -R {user}:{user} {app_root}")?;
    writeln!(out, "USER {user}")?;
    writeln!(out)?;

    if cfg.entrypoint == EntrypointMode::Native {
        let server = shell_words::join(cfg.server_argv().context("invalid server command")?);
        writeln!(out, "ENV SHIPWRIGHT_SERVER={}", env_value(&server)?)?;
        writeln!(out, "ENV SHIPWRIGHT_APP_ROOT={}", env_value(app_root)?)?;
        writeln!(
            out,
            "ENV SHIPWRIGHT_RUNTIME_ENV={}",
            env_value(&shell_words::join(cfg.runtime_env_pairs()))?
        )?;
    }
    writeln!(out, "ENV PORT={}", cfg.port)?;
    writeln!(out, "EXPOSE {}", cfg.port)?;
    writeln!(out)?;
    writeln!(out, "ENTRYPOINT {entrypoint}")?;
    Ok(out)
}

/// Render the POSIX entrypoint script. Its last command is `exec`, so the
/// server inherits PID 1 and receives the runtime's signals directly.
pub fn entrypoint_script(cfg: &Config) -> Result<String> {
    let argv = cfg.server_argv().context("invalid server command")?;

    let mut out = String::new();
    writeln!(out, "#!/bin/sh")?;
    writeln!(out, "# {HEADER}")?;
    writeln!(out, "set -e")?;
    writeln!(out)?;
    for (key, value) in &cfg.runtime_env {
        writeln!(out, "export {key}={}", shell_words::quote(value))?;
    }
    writeln!(out, "cd {}", shell_words::quote(&cfg.app_root))?;
    writeln!(out, "exec {} \"$@\"", shell_words::join(&argv))?;
    Ok(out)
}

/// Default `.dockerignore`, written only when the context has none, so the
/// environment file never ends up in an image layer.
pub fn dockerignore(cfg: &Config) -> String {
    let mut out = String::new();
    out.push_str(".git\n");
    out.push_str("__pycache__\n");
    out.push_str("*.pyc\n");
    out.push_str(".env\n");
    out.push_str(".env.*\n");
    if cfg.env_file != ".env" {
        out.push_str(&cfg.env_file);
        out.push('\n');
    }
    out
}

fn json_array(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// Double-quoted Dockerfile `ENV` value.
fn env_value(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
