use crate::error::RunFailure;

/// Classify a failed `docker run` from its stderr text.
pub fn classify_run_failure(stderr: &str) -> RunFailure {
    let text = stderr.to_ascii_lowercase();

    if text.contains("port is already allocated")
        || text.contains("address already in use")
        || (text.contains("bind") && text.contains("failed"))
    {
        RunFailure::PortAllocated
    } else if text.contains("is already in use by container") {
        RunFailure::NameConflict
    } else if text.contains("no such image")
        || text.contains("unable to find image")
        || text.contains("pull access denied")
        || text.contains("manifest unknown")
    {
        RunFailure::NoSuchImage
    } else if text.contains("env file")
        || text.contains("env-file")
        || (text.contains("docker: open ") && text.contains("no such file"))
    {
        RunFailure::EnvFile
    } else {
        RunFailure::Other
    }
}
