use std::fmt;

/// One invocation of the `docker` CLI. `args` excludes the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerCommand {
    pub args: Vec<String>,
    /// Mirror output to the terminal as it arrives.
    pub echo: bool,
}

impl DockerCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            echo: true,
        }
    }

    /// Capture output without echoing it.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// The docker subcommand, e.g. `build` or `run`.
    pub fn verb(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for DockerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "docker {}", shell_words::join(&self.args))
    }
}

/// Outcome of a docker invocation.
#[derive(Debug, Clone, Default)]
pub struct ContainerResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ContainerResult {
    /// Exit code to propagate; signals and unknown statuses map to 1.
    pub fn code(&self) -> i32 {
        match self.exit_code {
            Some(0) if !self.success => 1,
            Some(code) => code,
            None => 1,
        }
    }
}

/// Streamed output from a running docker command.
#[derive(Debug)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
    Done(ContainerResult),
}
