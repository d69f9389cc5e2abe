// Image build description — Dockerfile and entrypoint rendering, drift checks.
mod dockerfile;
mod drift;

pub use dockerfile::{
    DOCKERFILE, DOCKERIGNORE, ENTRYPOINT_SCRIPT, GeneratedFile, NATIVE_BINARY, dockerfile,
    dockerignore, entrypoint_script, generated_files, is_generated,
};
pub use drift::{DriftKind, FileDrift, check, write};
