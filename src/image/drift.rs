use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use similar::TextDiff;

use super::dockerfile::{DOCKERIGNORE, GeneratedFile, dockerignore, generated_files, is_generated};
use crate::config::Config;
use crate::error::HarnessError;

// ── Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    Missing,
    Modified,
}

/// A generated file whose on-disk contents differ from what the config renders.
#[derive(Debug, Clone)]
pub struct FileDrift {
    pub name: &'static str,
    pub kind: DriftKind,
    /// Unified diff from the file on disk to the rendered contents.
    pub diff: String,
}

// ── Check / write ────────────────────────────────────────────────────

/// Compare the generated files against the build context. Empty when in sync.
pub fn check(root: &Path, cfg: &Config) -> Result<Vec<FileDrift>> {
    let mut drift = Vec::new();

    for file in generated_files(cfg)? {
        let path = root.join(file.name);
        match std::fs::read_to_string(&path) {
            Ok(on_disk) if on_disk == file.contents => {}
            Ok(on_disk) => drift.push(FileDrift {
                name: file.name,
                kind: DriftKind::Modified,
                diff: unified_diff(file.name, &on_disk, &file.contents),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => drift.push(FileDrift {
                name: file.name,
                kind: DriftKind::Missing,
                diff: unified_diff(file.name, "", &file.contents),
            }),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        }
    }

    Ok(drift)
}

/// Write every generated file into the build context. Returns the paths that
/// were created or changed.
///
/// Files without the generated header belong to the user; when one is in the
/// way nothing is written.
pub fn write(root: &Path, cfg: &Config) -> Result<Vec<PathBuf>> {
    let files = generated_files(cfg)?;
    let mut current = Vec::with_capacity(files.len());
    for file in &files {
        let path = root.join(file.name);
        let on_disk = std::fs::read_to_string(&path).ok();
        if let Some(text) = &on_disk
            && *text != file.contents
            && !is_generated(text)
        {
            return Err(HarnessError::NotGenerated(path).into());
        }
        current.push(on_disk);
    }

    let mut written = Vec::new();
    for (file, current) in files.iter().zip(current) {
        let path = root.join(file.name);
        if current.as_deref() != Some(file.contents.as_str()) {
            std::fs::write(&path, &file.contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            written.push(path.clone());
        }
        set_mode(&path, file)?;
    }

    let ignore = root.join(DOCKERIGNORE);
    if !ignore.exists() {
        std::fs::write(&ignore, dockerignore(cfg))
            .with_context(|| format!("failed to write {}", ignore.display()))?;
        written.push(ignore);
    }

    Ok(written)
}

#[cfg(unix)]
fn set_mode(path: &Path, file: &GeneratedFile) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !file.executable {
        return Ok(());
    }
    let mut perms = std::fs::metadata(path)?.permissions();
    if perms.mode() & 0o111 != 0o111 {
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to chmod {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _file: &GeneratedFile) -> Result<()> {
    Ok(())
}

fn unified_diff(name: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────
