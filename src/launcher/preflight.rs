use std::fs::File;
use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};

use crate::error::HarnessError;

/// Resolve the environment file against the context root and make sure it can
/// be opened. The contents are never read.
pub fn env_file(root: &Path, configured: &str) -> Result<PathBuf, HarnessError> {
    let path = root.join(configured);
    match File::open(&path) {
        Ok(_) if path.is_file() => Ok(path),
        _ => Err(HarnessError::EnvFileUnreadable(path)),
    }
}

/// Fail when something on the host already listens on `port`.
pub fn port_available(port: u16) -> Result<(), HarnessError> {
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(_) => Err(HarnessError::PortInUse(port)),
    }
}
