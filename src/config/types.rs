use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// How the container hands PID 1 to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrypointMode {
    /// Rendered `docker-entrypoint.sh` ending in `exec`.
    Script,
    /// `shipwright entrypoint`, copied into the image from the build context.
    Native,
}

impl EntrypointMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrypointMode::Script => "script",
            EntrypointMode::Native => "native",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub image: String,
    pub port: u16,
    pub base_image: String,
    pub manifest: String,
    pub install: String,
    pub app_root: String,
    pub user: String,
    pub uid: u32,
    pub server: String,
    pub runtime_env: BTreeMap<String, String>,
    pub env_file: String,
    pub entrypoint: EntrypointMode,
    pub detach: bool,
    pub container_name: Option<String>,
    /// Path polled over HTTP after a detached start.
    pub health_path: String,
    pub ready_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        let mut runtime_env = BTreeMap::new();
        runtime_env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        runtime_env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());

        Self {
            image: "tradingagents:latest".to_string(),
            port: 11360,
            base_image: "python:3.11-slim".to_string(),
            manifest: "requirements.txt".to_string(),
            install: "pip install --no-cache-dir -r requirements.txt".to_string(),
            app_root: "/app".to_string(),
            user: "appuser".to_string(),
            uid: 1000,
            server: "python http_server.py".to_string(),
            runtime_env,
            env_file: ".env".to_string(),
            entrypoint: EntrypointMode::Script,
            detach: false,
            container_name: None,
            health_path: "/health".to_string(),
            ready_timeout: 30,
        }
    }
}

impl Config {
    /// Reject settings that would break the image or run contract.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |msg: String| Err(HarnessError::InvalidConfig(msg));

        if self.image.trim().is_empty() {
            return invalid("image tag cannot be blank".into());
        }
        if self.port == 0 {
            return invalid("port must be between 1 and 65535".into());
        }
        if !self.app_root.starts_with('/') {
            return invalid(format!("app_root must be absolute, got {:?}", self.app_root));
        }
        if self.manifest.trim().is_empty() || Path::new(&self.manifest).is_absolute() {
            return invalid(format!(
                "manifest must be a path inside the build context, got {:?}",
                self.manifest
            ));
        }
        if !self.health_path.starts_with('/') {
            return invalid(format!("health_path must start with '/', got {:?}", self.health_path));
        }
        if self.user.trim().is_empty() || self.user == "root" || self.uid == 0 {
            return invalid("the service user must be a non-root account".into());
        }
        match self.server_argv() {
            Ok(argv) if !argv.is_empty() => {}
            Ok(_) => return invalid("server command cannot be empty".into()),
            Err(e) => return invalid(format!("server command: {e}")),
        }
        if let Some(key) = self
            .runtime_env
            .keys()
            .find(|k| k.is_empty() || k.contains('='))
        {
            return invalid(format!("invalid runtime_env key {key:?}"));
        }
        Ok(())
    }

    /// The server command line split into argv.
    pub fn server_argv(&self) -> Result<Vec<String>, shell_words::ParseError> {
        shell_words::split(&self.server)
    }

    /// `runtime_env` rendered as `KEY=VALUE` words.
    pub fn runtime_env_pairs(&self) -> Vec<String> {
        self.runtime_env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect()
    }

    /// Name given to the container; derived from the image tag when unset.
    pub fn container_name(&self) -> String {
        if let Some(name) = &self.container_name {
            return name.clone();
        }
        let repo = match self.image.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => repo,
            _ => self.image.as_str(),
        };
        let sanitized: String = repo
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        // Docker names must start with [a-zA-Z0-9].
        let sanitized = sanitized.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
        let base = if sanitized.is_empty() { "shipwright" } else { sanitized };
        format!("{base}-{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_port() {
        let cfg = Config {
            port: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_relative_app_root() {
        let cfg = Config {
            app_root: "app".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_root_user() {
        let cfg = Config {
            user: "root".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            uid: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_absolute_manifest() {
        let cfg = Config {
            manifest: "/etc/requirements.txt".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_or_unbalanced_server() {
        let cfg = Config {
            server: "   ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            server: "python 'unterminated".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn server_argv_respects_quotes() {
        let cfg = Config {
            server: "uvicorn 'http_server:app' --host 0.0.0.0".into(),
            ..Config::default()
        };
        assert_eq!(
            cfg.server_argv().unwrap(),
            vec!["uvicorn", "http_server:app", "--host", "0.0.0.0"]
        );
    }

    #[test]
    fn runtime_env_pairs_are_sorted() {
        let pairs = Config::default().runtime_env_pairs();
        assert_eq!(pairs, vec!["PYTHONDONTWRITEBYTECODE=1", "PYTHONUNBUFFERED=1"]);
    }

    #[test]
    fn container_name_derives_from_image() {
        let cfg = Config {
            image: "registry.local/trading agents:1.0".into(),
            ..Config::default()
        };
        assert_eq!(cfg.container_name(), "registry-local-trading-agents-11360");

        let cfg = Config {
            container_name: Some("svc".into()),
            ..Config::default()
        };
        assert_eq!(cfg.container_name(), "svc");
    }

    #[test]
    fn container_name_starts_alphanumeric() {
        for (image, expected) in [
            ("-svc:latest", "svc-11360"),
            ("_svc", "svc-11360"),
            ("./svc:1", "svc-11360"),
            ("..:latest", "shipwright-11360"),
        ] {
            let cfg = Config {
                image: image.into(),
                ..Config::default()
            };
            assert_eq!(cfg.container_name(), expected, "{image}");
        }
    }

    #[test]
    fn rejects_relative_health_path() {
        let cfg = Config {
            health_path: "health".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn entrypoint_mode_deserializes_lowercase() {
        let mode: EntrypointMode = serde_yaml::from_str("native").unwrap();
        assert_eq!(mode, EntrypointMode::Native);
        assert_eq!(mode.as_str(), "native");
    }
}
