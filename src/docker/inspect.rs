use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;

/// The parts of `docker image inspect` output the harness verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: String,
    pub user: String,
    pub exposed_ports: Vec<String>,
}

#[derive(Deserialize)]
struct RawImage {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Config")]
    config: Option<RawConfig>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(rename = "User", default)]
    user: String,
    #[serde(rename = "ExposedPorts", default)]
    exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
}

/// Parse the JSON array printed by `docker image inspect <tag>`.
pub fn parse_image_inspect(json: &str) -> Result<ImageInfo> {
    let images: Vec<RawImage> =
        serde_json::from_str(json).context("unexpected `docker image inspect` output")?;
    let image = images
        .into_iter()
        .next()
        .context("`docker image inspect` returned no images")?;

    let (user, exposed_ports) = match image.config {
        Some(cfg) => (
            cfg.user,
            cfg.exposed_ports
                .map(|ports| ports.into_keys().collect())
                .unwrap_or_default(),
        ),
        None => (String::new(), Vec::new()),
    };

    Ok(ImageInfo {
        id: image.id,
        user,
        exposed_ports,
    })
}

impl ImageInfo {
    /// True when the image would start its process as root.
    pub fn runs_as_root(&self) -> bool {
        let name = self.user.split(':').next().unwrap_or_default();
        name.is_empty() || name == "root" || name == "0"
    }

    pub fn exposes(&self, port: u16) -> bool {
        let tcp = format!("{port}/tcp");
        self.exposed_ports.iter().any(|p| *p == tcp)
    }
}
