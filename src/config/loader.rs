use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::types::Config;

/// File name of the harness config inside the build context.
pub const CONFIG_FILE: &str = ".shipwright.yaml";

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Load `.shipwright.yaml` from the given directory, falling back to defaults
/// when the file does not exist. The result is validated.
pub fn load(dir: &Path) -> Result<Config> {
    let path = config_path(dir);
    let config = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };
    config.validate()?;
    Ok(config)
}
