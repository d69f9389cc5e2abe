//! Exercises `shipwright entrypoint` as a real process.
#![cfg(unix)]

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn entrypoint(server: &str, app_root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shipwright"));
    cmd.arg("entrypoint")
        .env("SHIPWRIGHT_SERVER", server)
        .env("SHIPWRIGHT_APP_ROOT", app_root)
        .env_remove("SHIPWRIGHT_RUNTIME_ENV")
        .env_remove("SHIPWRIGHT_LOG")
        .env_remove("PYTHONUNBUFFERED")
        .env_remove("PYTHONDONTWRITEBYTECODE")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn server_keeps_the_entrypoint_pid() {
    let dir = tempfile::tempdir().unwrap();
    let child = entrypoint("sh -c 'echo $$'", dir.path()).spawn().unwrap();
    let pid = child.id();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output).trim(), pid.to_string());
}

#[test]
fn forwarded_arguments_arrive_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let output = entrypoint("sh -c 'printf \"[%s]\\n\" \"$@\"' server", dir.path())
        .args(["--flag", "two words", "--", ""])
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output), "[--flag]\n[two words]\n[--]\n[]\n");
}

#[test]
fn server_starts_in_the_app_root() {
    let dir = tempfile::tempdir().unwrap();
    let output = entrypoint("sh -c 'pwd -P'", dir.path()).output().unwrap();

    assert!(output.status.success(), "{output:?}");
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(stdout(&output).trim(), expected.to_string_lossy());
}

#[test]
fn runtime_flags_are_set() {
    let dir = tempfile::tempdir().unwrap();
    let output = entrypoint(
        "sh -c 'echo \"$PYTHONUNBUFFERED $PYTHONDONTWRITEBYTECODE\"'",
        dir.path(),
    )
    .output()
    .unwrap();
    assert_eq!(stdout(&output).trim(), "1 1");

    let output = entrypoint("sh -c 'echo \"$GREETING\"'", dir.path())
        .env("SHIPWRIGHT_RUNTIME_ENV", "'GREETING=hi there'")
        .output()
        .unwrap();
    assert_eq!(stdout(&output).trim(), "hi there");
}

#[test]
fn server_exit_status_is_the_container_status() {
    let dir = tempfile::tempdir().unwrap();
    let output = entrypoint("sh -c 'exit 7'", dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn missing_server_fails_fast_with_127() {
    let dir = tempfile::tempdir().unwrap();
    let output = entrypoint("/nonexistent/http-server --port 1", dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(127));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/http-server"));
}

#[test]
fn missing_app_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = entrypoint("sh -c 'echo started'", &dir.path().join("absent"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn termination_signal_reaches_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = entrypoint(
        "sh -c 'trap \"exit 42\" TERM; echo ready; while :; do sleep 0.1; done'",
        dir.path(),
    )
    .spawn()
    .unwrap();

    let mut reader = BufReader::new(child.stdout.take().unwrap());
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line.trim(), "ready");

    // SAFETY: sending SIGTERM to a child we spawned and have not yet reaped.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(42));
}
