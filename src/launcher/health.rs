use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::debug;

use crate::error::HarnessError;

const PROBE_INTERVAL: Duration = Duration::from_millis(250);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `GET http://127.0.0.1:<port><path>` until the server answers 2xx or
/// `timeout` elapses. Returns how long it took.
///
/// Docker's port proxy accepts on the host port as soon as the container
/// starts, so only an HTTP answer proves the server is up.
pub fn wait_until_healthy(port: u16, path: &str, timeout: Duration) -> Result<Duration> {
    let client = Client::builder()
        .timeout(PROBE_TIMEOUT)
        .no_proxy()
        .build()
        .context("failed to build health check client")?;
    let url = format!("http://127.0.0.1:{port}{path}");
    let start = Instant::now();

    loop {
        match client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => return Ok(start.elapsed()),
            Ok(resp) => debug!(%url, status = %resp.status(), "server not healthy yet"),
            Err(e) => debug!(%url, "health check failed: {e}"),
        }
        if start.elapsed() >= timeout {
            return Err(HarnessError::NotReady {
                port,
                path: path.to_string(),
                secs: timeout.as_secs(),
            }
            .into());
        }
        std::thread::sleep(PROBE_INTERVAL);
    }
}

/// Answer every request on `listener` with `status` and an empty body.
#[cfg(test)]
pub(crate) fn serve_status(listener: std::net::TcpListener, status: &'static str) {
    use std::io::{Read, Write};

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            let _ = write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
        }
    });
}
