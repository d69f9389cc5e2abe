//! End-to-end tests against a real Docker daemon.
//!
//! These pull `python:3.11-slim` and bind host ports, so they are marked
//! `#[ignore]`. Run with: `cargo test -- --ignored`

use std::net::TcpStream;
use std::path::Path;
use std::process::Command;

use shipwright::config::Config;
use shipwright::docker::DockerCli;
use shipwright::error::HarnessError;
use shipwright::launcher::{self, LaunchInput, RunReport};

const SERVER: &str = r#"import os
from http.server import BaseHTTPRequestHandler, HTTPServer


class Health(BaseHTTPRequestHandler):
    def do_GET(self):
        self.send_response(200)
        self.end_headers()
        self.wfile.write(b'{"status": "healthy"}')


HTTPServer(("0.0.0.0", int(os.environ["PORT"])), Health).serve_forever()
"#;

/// A build context with an empty manifest, a stdlib HTTP server and an env file.
fn setup_context(with_env: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    // The read-only mount keeps host permissions; the service user must be able to enter it.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    std::fs::write(dir.path().join("requirements.txt"), "").unwrap();
    std::fs::write(dir.path().join("http_server.py"), SERVER).unwrap();
    if with_env {
        std::fs::write(dir.path().join(".env"), "SERVICE_MODE=test\n").unwrap();
    }
    dir
}

fn config(port: u16, name: &str) -> Config {
    Config {
        image: "shipwright-e2e:latest".into(),
        port,
        install: "pip install --no-cache-dir -r requirements.txt".into(),
        detach: true,
        ready_timeout: 60,
        container_name: Some(name.into()),
        ..Config::default()
    }
}

fn container_exists(name: &str) -> bool {
    let output = Command::new("docker")
        .args(["ps", "--all", "--quiet", "--filter"])
        .arg(format!("name=^{name}$"))
        .output()
        .expect("docker ps");
    !String::from_utf8_lossy(&output.stdout).trim().is_empty()
}

fn harness_error(err: &anyhow::Error) -> &HarnessError {
    err.downcast_ref::<HarnessError>()
        .unwrap_or_else(|| panic!("not a HarnessError: {err:#}"))
}

fn up(cfg: Config, dir: &Path) -> anyhow::Result<RunReport> {
    let input = LaunchInput {
        config: cfg,
        context_dir: dir.to_path_buf(),
        forwarded: Vec::new(),
    };
    launcher::up(&mut DockerCli, &input).map(|(_, run)| run)
}

#[test]
#[ignore]
fn up_serves_and_stop_removes_container() {
    let dir = setup_context(true);
    let cfg = config(11360, "shipwright-e2e-up");

    let report = up(cfg.clone(), dir.path()).expect("up failed");
    assert!(matches!(report, RunReport::Detached { .. }));
    assert!(TcpStream::connect(("127.0.0.1", 11360)).is_ok());

    // A second run against the bound port is refused and leaves the first alone.
    let err = launcher::run(&mut DockerCli, &cfg, dir.path(), &[]).unwrap_err();
    assert!(matches!(harness_error(&err), HarnessError::PortInUse(11360)));
    assert!(container_exists("shipwright-e2e-up"));

    launcher::stop(&mut DockerCli, &cfg).expect("stop failed");
    // `--rm` removal is asynchronous to `docker stop` returning.
    for _ in 0..50 {
        if !container_exists("shipwright-e2e-up") {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    assert!(!container_exists("shipwright-e2e-up"));
}

#[test]
#[ignore]
fn rebuild_of_unchanged_context_keeps_the_tag() {
    let dir = setup_context(true);
    let cfg = config(11362, "shipwright-e2e-rebuild");

    let first = launcher::build(&mut DockerCli, &cfg, dir.path()).expect("first build");
    let second = launcher::build(&mut DockerCli, &cfg, dir.path()).expect("second build");
    assert_eq!(first.image, second.image);
    assert_eq!(first.image_id, second.image_id);
    assert!(second.rendered.is_empty());
}

#[test]
#[ignore]
fn missing_env_file_starts_nothing() {
    let dir = setup_context(false);
    let cfg = config(11361, "shipwright-e2e-noenv");

    let err = up(cfg, dir.path()).unwrap_err();
    assert!(matches!(harness_error(&err), HarnessError::EnvFileUnreadable(_)));
    assert_ne!(harness_error(&err).exit_code(), 0);
    assert!(!container_exists("shipwright-e2e-noenv"));
}

#[test]
#[ignore]
fn missing_manifest_fails_before_run() {
    let dir = setup_context(true);
    std::fs::remove_file(dir.path().join("requirements.txt")).unwrap();
    let cfg = config(11363, "shipwright-e2e-nomanifest");

    let err = up(cfg, dir.path()).unwrap_err();
    assert!(matches!(harness_error(&err), HarnessError::ManifestMissing(_)));
    assert!(!container_exists("shipwright-e2e-nomanifest"));
}
