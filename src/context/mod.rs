// Build context inspection — manifest and application source checks before any docker call.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use walkdir::WalkDir;

use crate::config::{CONFIG_FILE, Config};
use crate::error::HarnessError;
use crate::image::{DOCKERFILE, ENTRYPOINT_SCRIPT};

/// A validated build context.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Absolute path of the context directory.
    pub root: PathBuf,
    /// Manifest path relative to `root`.
    pub manifest: PathBuf,
    /// Application source files (relative, sorted), excluding the manifest and generated files.
    pub sources: Vec<String>,
}

impl BuildContext {
    pub fn dockerfile(&self) -> PathBuf {
        self.root.join(DOCKERFILE)
    }
}

/// Resolve a context directory to an absolute path.
pub fn resolve_root(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        bail!("build context is not a directory: {}", dir.display());
    }
    dir.canonicalize()
        .with_context(|| format!("failed to resolve {}", dir.display()))
}

/// Check that `dir` holds a readable manifest and some application source.
pub fn inspect(dir: &Path, cfg: &Config) -> Result<BuildContext> {
    let root = resolve_root(dir)?;
    let manifest = PathBuf::from(&cfg.manifest);
    let manifest_abs = root.join(&manifest);

    if !manifest_abs.is_file() || File::open(&manifest_abs).is_err() {
        return Err(HarnessError::ManifestMissing(manifest).into());
    }

    let sources = discover_sources(&root, &manifest_abs);
    if sources.is_empty() {
        return Err(HarnessError::NoApplicationSource(cfg.manifest.clone()).into());
    }

    Ok(BuildContext {
        root,
        manifest,
        sources,
    })
}

/// Walk the context for application files. Returns sorted relative paths.
pub fn discover_sources(root: &Path, manifest: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !should_skip(e));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path == manifest || is_harness_file(path, root) {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(root) {
            files.push(rel.to_string_lossy().to_string());
        }
    }

    files.sort();
    files
}

fn is_harness_file(path: &Path, root: &Path) -> bool {
    path.parent() == Some(root)
        && matches!(
            path.file_name().and_then(|n| n.to_str()),
            Some(name) if name == DOCKERFILE
                || name == ENTRYPOINT_SCRIPT
                || name == CONFIG_FILE
                || name == ".dockerignore"
                || name.starts_with(".env")
        )
}

fn should_skip(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    matches!(
        entry.file_name().to_str().unwrap_or_default(),
        ".git" | "target" | "node_modules" | "__pycache__" | ".venv" | ".idea" | ".vscode"
    )
}
