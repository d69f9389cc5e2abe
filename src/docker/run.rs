use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{Context, Result};

use super::types::{ContainerResult, DockerCommand, OutputLine};

/// Program invoked for every docker command.
pub const DOCKER: &str = "docker";

/// Bytes of each stream kept from an echoed command. Its output is already on
/// the terminal; the tail is enough to diagnose a failed `docker run`.
pub const ECHOED_TAIL_BYTES: usize = 8 * 1024;

/// Spawn a docker command and return a channel that streams its output.
///
/// The caller receives [`OutputLine::Stdout`]/[`Stderr`] as they arrive,
/// followed by exactly one [`OutputLine::Done`] carrying the final result.
/// There is no timeout: a command that hangs keeps the channel open.
pub fn spawn(cmd: &DockerCommand) -> Result<Receiver<OutputLine>> {
    spawn_program(DOCKER, cmd)
}

fn spawn_program(program: &str, cmd: &DockerCommand) -> Result<Receiver<OutputLine>> {
    let mut child = Command::new(program)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{program}`; is it installed and on PATH?"))?;

    let stdout = child.stdout.take().context("stdout was not piped")?;
    let stderr = child.stderr.take().context("stderr was not piped")?;

    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        orchestrate(child, stdout, stderr, tx);
    });

    Ok(rx)
}

fn orchestrate(
    mut child: std::process::Child,
    stdout: std::process::ChildStdout,
    stderr: std::process::ChildStderr,
    tx: Sender<OutputLine>,
) {
    // --- reader threads ---------------------------------------------------
    let tx_out = tx.clone();
    let stdout_handle = std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stdout);
        for line in reader.lines() {
            match line {
                // Receiver may be dropped; ignore send errors.
                Ok(l) => {
                    let _ = tx_out.send(OutputLine::Stdout(l));
                }
                Err(_) => break,
            }
        }
    });

    let tx_err = tx.clone();
    let stderr_handle = std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stderr);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    let _ = tx_err.send(OutputLine::Stderr(l));
                }
                Err(_) => break,
            }
        }
    });

    // --- wait --------------------------------------------------------------
    let exit_status = child.wait().ok();

    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let exit_code = exit_status.and_then(|s| s.code());
    let _ = tx.send(OutputLine::Done(ContainerResult {
        success: exit_status.is_some_and(|s| s.success()),
        exit_code,
        stdout: String::new(),
        stderr: String::new(),
    }));
}

/// Run a docker command to completion, echoing its output when requested.
///
/// Quiet commands keep their whole output. Echoed commands, such as a
/// foreground `docker run` that lasts as long as the server, keep only the
/// last [`ECHOED_TAIL_BYTES`] of each stream.
pub fn execute(cmd: &DockerCommand) -> Result<ContainerResult> {
    let limit = cmd.echo.then_some(ECHOED_TAIL_BYTES);
    drain(spawn(cmd)?, cmd.echo, limit)
}

fn drain(rx: Receiver<OutputLine>, echo: bool, limit: Option<usize>) -> Result<ContainerResult> {
    let mut stdout = Capture::new(limit);
    let mut stderr = Capture::new(limit);

    for line in rx {
        match line {
            OutputLine::Stdout(s) => {
                if echo {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{s}");
                    let _ = out.flush();
                }
                stdout.push(s);
            }
            OutputLine::Stderr(s) => {
                if echo {
                    let _ = writeln!(std::io::stderr().lock(), "{s}");
                }
                stderr.push(s);
            }
            OutputLine::Done(mut result) => {
                result.stdout = stdout.into_string();
                result.stderr = stderr.into_string();
                return Ok(result);
            }
        }
    }

    anyhow::bail!("docker output stream closed without an exit status")
}

/// Lines of one output stream, optionally trimmed to the last `limit` bytes.
/// The newest line is always kept.
struct Capture {
    lines: VecDeque<String>,
    bytes: usize,
    limit: Option<usize>,
}

impl Capture {
    fn new(limit: Option<usize>) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit,
        }
    }

    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        let Some(limit) = self.limit else { return };
        while self.bytes > limit && self.lines.len() > 1 {
            if let Some(old) = self.lines.pop_front() {
                self.bytes -= old.len() + 1;
            }
        }
    }

    fn into_string(self) -> String {
        let mut out = String::with_capacity(self.bytes);
        for line in self.lines {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
