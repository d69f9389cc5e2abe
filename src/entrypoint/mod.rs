//! Container entrypoint.
//!
//! Runs as PID 1 inside the container: puts the runtime flags into the
//! server's environment, enters the application root and replaces itself with
//! the server process. Because the process image is replaced rather than a
//! child spawned, the PID stays the same and signals sent by the container
//! runtime reach the server directly.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::HarnessError;

/// Server command line, split with shell-words.
pub const SERVER_VAR: &str = "SHIPWRIGHT_SERVER";
/// Absolute application root to enter before exec.
pub const APP_ROOT_VAR: &str = "SHIPWRIGHT_APP_ROOT";
/// Shell-words list of `KEY=VALUE` flags for the server environment.
pub const RUNTIME_ENV_VAR: &str = "SHIPWRIGHT_RUNTIME_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Environment and working directory setup.
    Preparing,
    /// The server has replaced the entrypoint.
    Running,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparing => f.write_str("PREPARING"),
            Self::Running => f.write_str("RUNNING"),
        }
    }
}

/// What the entrypoint hands control to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    pub server: Vec<String>,
    pub app_root: PathBuf,
    pub runtime_env: Vec<(String, String)>,
}

impl Entrypoint {
    pub fn from_config(cfg: &Config) -> Result<Self, HarnessError> {
        let server = cfg
            .server_argv()
            .map_err(|e| HarnessError::InvalidConfig(format!("server command: {e}")))?;
        Self::new(server, PathBuf::from(&cfg.app_root), cfg.runtime_env_pairs())
    }

    /// Read settings from the process environment, falling back to `defaults`
    /// for anything unset.
    pub fn from_env(defaults: &Config) -> Result<Self, HarnessError> {
        Self::from_lookup(|key| std::env::var(key).ok(), defaults)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        defaults: &Config,
    ) -> Result<Self, HarnessError> {
        let split = |var: &str, value: &str| {
            shell_words::split(value).map_err(|e| HarnessError::InvalidConfig(format!("{var}: {e}")))
        };

        let server = match lookup(SERVER_VAR) {
            Some(value) => split(SERVER_VAR, &value)?,
            None => split("server", &defaults.server)?,
        };
        let app_root = lookup(APP_ROOT_VAR).unwrap_or_else(|| defaults.app_root.clone());
        let runtime_env = match lookup(RUNTIME_ENV_VAR) {
            Some(value) => split(RUNTIME_ENV_VAR, &value)?,
            None => defaults.runtime_env_pairs(),
        };

        Self::new(server, PathBuf::from(app_root), runtime_env)
    }

    fn new(
        server: Vec<String>,
        app_root: PathBuf,
        runtime_env: Vec<String>,
    ) -> Result<Self, HarnessError> {
        if server.is_empty() {
            return Err(HarnessError::InvalidConfig("server command is empty".into()));
        }
        let runtime_env = runtime_env
            .into_iter()
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
                _ => Err(HarnessError::InvalidConfig(format!(
                    "runtime env entry {pair:?} is not KEY=VALUE"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            server,
            app_root,
            runtime_env,
        })
    }

    /// The server invocation: configured argv followed by `forwarded`, with the
    /// runtime flags added to the inherited environment.
    pub fn command(&self, forwarded: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.server[0]);
        cmd.args(&self.server[1..]).args(forwarded);
        for (key, value) in &self.runtime_env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Enter the application root and replace this process with the server.
    ///
    /// Only returns on failure; there is no retry.
    #[cfg(unix)]
    pub fn start(&self, forwarded: &[OsString]) -> Result<i32, HarnessError> {
        use std::os::unix::process::CommandExt;

        self.prepare()?;
        debug!(state = %State::Running, server = ?self.server, "exec");
        let source = self.command(forwarded).exec();
        Err(HarnessError::ServerExec {
            program: self.server[0].clone(),
            source,
        })
    }

    /// Without `exec`, run the server as a child and mirror its exit status.
    #[cfg(not(unix))]
    pub fn start(&self, forwarded: &[OsString]) -> Result<i32, HarnessError> {
        self.prepare()?;
        debug!(state = %State::Running, server = ?self.server, "spawn");
        let status = self
            .command(forwarded)
            .status()
            .map_err(|source| HarnessError::ServerExec {
                program: self.server[0].clone(),
                source,
            })?;
        Ok(status.code().unwrap_or(1))
    }

    fn prepare(&self) -> Result<(), HarnessError> {
        debug!(state = %State::Preparing, app_root = %self.app_root.display());
        warn_if_root();
        std::env::set_current_dir(&self.app_root).map_err(|source| HarnessError::AppRoot {
            path: self.app_root.clone(),
            source,
        })
    }
}

#[cfg(unix)]
fn warn_if_root() {
    // SAFETY: geteuid() is a simple POSIX getter that always succeeds and has no side effects.
    if unsafe { libc::geteuid() } == 0 {
        warn!("entrypoint is running as root; the image should switch to a service user");
    }
}

#[cfg(not(unix))]
fn warn_if_root() {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_come_from_config() {
        let ep = Entrypoint::from_lookup(lookup(&[]), &Config::default()).unwrap();
        assert_eq!(ep.server, vec!["python", "http_server.py"]);
        assert_eq!(ep.app_root, PathBuf::from("/app"));
        assert!(ep.runtime_env.contains(&("PYTHONUNBUFFERED".into(), "1".into())));
        assert!(ep.runtime_env.contains(&("PYTHONDONTWRITEBYTECODE".into(), "1".into())));
    }

    #[test]
    fn environment_overrides_defaults() {
        let ep = Entrypoint::from_lookup(
            lookup(&[
                (SERVER_VAR, "uvicorn 'http_server:app' --port 11360"),
                (APP_ROOT_VAR, "/srv"),
                (RUNTIME_ENV_VAR, "A=1 'B=two words'"),
            ]),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(ep.server, vec!["uvicorn", "http_server:app", "--port", "11360"]);
        assert_eq!(ep.app_root, PathBuf::from("/srv"));
        assert_eq!(
            ep.runtime_env,
            vec![("A".into(), "1".into()), ("B".into(), "two words".into())]
        );
    }

    #[test]
    fn empty_server_is_rejected() {
        let err = Entrypoint::from_lookup(lookup(&[(SERVER_VAR, "  ")]), &Config::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_runtime_env_is_rejected() {
        let err = Entrypoint::from_lookup(
            lookup(&[(RUNTIME_ENV_VAR, "NOVALUE")]),
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("NOVALUE"));
    }

    #[test]
    fn command_appends_forwarded_args_verbatim() {
        let ep = Entrypoint::from_config(&Config::default()).unwrap();
        let forwarded = vec![OsString::from("--reload"), OsString::from("a b"), OsString::from("--")];
        let cmd = ep.command(&forwarded);
        assert_eq!(cmd.get_program(), "python");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec!["http_server.py", "--reload", "a b", "--"]);

        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(
            std::ffi::OsStr::new("PYTHONUNBUFFERED"),
            Some(std::ffi::OsStr::new("1"))
        )));
    }

    #[test]
    fn state_labels() {
        assert_eq!(State::Preparing.to_string(), "PREPARING");
        assert_eq!(State::Running.to_string(), "RUNNING");
    }
}
