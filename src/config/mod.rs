// Harness configuration — `.shipwright.yaml`, the single source of truth for port, paths and commands.
mod loader;
mod types;

pub use loader::{CONFIG_FILE, config_path, load};
pub use types::{Config, EntrypointMode};
