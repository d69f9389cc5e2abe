// Docker orchestration — CLI invocation, streaming output, inspection and failure diagnosis.

pub mod diagnose;
pub mod engine;
pub mod inspect;
pub mod run;
pub mod types;

pub use diagnose::classify_run_failure;
pub use engine::{DockerCli, DockerClient, ensure_available};
pub use inspect::{ImageInfo, parse_image_inspect};
pub use run::{execute, spawn};
pub use types::{ContainerResult, DockerCommand, OutputLine};
