use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shipwright::config::{self, Config};
use shipwright::docker::DockerCli;
use shipwright::entrypoint::Entrypoint;
use shipwright::error::HarnessError;
use shipwright::image;
use shipwright::launcher::{self, LaunchInput, RunReport};

/// Build, launch and enter a single-service container image
#[derive(Parser)]
#[command(name = "shipwright")]
#[command(version, about, long_about = None)]
struct Args {
    /// Build context holding the application, its manifest and .shipwright.yaml
    #[arg(short = 'C', long, global = true, env = "SHIPWRIGHT_CONTEXT", default_value = ".")]
    context: PathBuf,

    /// Log level used when SHIPWRIGHT_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Build the image, then run the container (default)
    Up {
        /// Arguments forwarded to the server process
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Build and verify the image
    Build,

    /// Run a container from the already built image
    Run {
        /// Arguments forwarded to the server process
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Write the generated Dockerfile and entrypoint script into the context
    Render {
        /// Only report drift between the files on disk and the config
        #[arg(long)]
        check: bool,
    },

    /// Stop the running container
    Stop,

    /// Container entrypoint: exec the server with these arguments (used as PID 1)
    #[command(disable_help_flag = true)]
    Entrypoint {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
}

const LOG_ENV: &str = "SHIPWRIGHT_LOG";

fn main() -> ExitCode {
    // The entrypoint forwards argv untouched, so it bypasses clap entirely.
    let argv: Vec<OsString> = std::env::args_os().collect();
    if argv.get(1).is_some_and(|a| a == "entrypoint") {
        setup_logging("warn");
        return entrypoint(&argv[2..]);
    }

    let args = Args::parse();
    if let Some(SubCommand::Entrypoint { args: forwarded }) = &args.command {
        setup_logging("warn");
        return entrypoint(forwarded);
    }
    setup_logging(&args.log_level);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    let command = args.command.unwrap_or(SubCommand::Up { args: Vec::new() });
    let cfg = config::load(&args.context)?;
    let mut docker = DockerCli;

    match command {
        SubCommand::Up { args: forwarded } => {
            let input = LaunchInput {
                config: cfg,
                context_dir: args.context,
                forwarded,
            };
            let (_, report) = launcher::up_with(&mut docker, &input, wait_through_interrupts)?;
            print_run_report(&report);
        }
        SubCommand::Build => {
            let report = launcher::build(&mut docker, &cfg, &args.context)?;
            println!("{} {}", report.image, report.image_id);
        }
        SubCommand::Run { args: forwarded } => {
            wait_through_interrupts(&cfg);
            let report = launcher::run(&mut docker, &cfg, &args.context, &forwarded)?;
            print_run_report(&report);
        }
        SubCommand::Render { check } => render(&cfg, &args.context, check)?,
        SubCommand::Stop => launcher::stop(&mut docker, &cfg)?,
        SubCommand::Entrypoint { .. } => unreachable!("entrypoint is dispatched in main"),
    }
    Ok(())
}

fn render(cfg: &Config, dir: &std::path::Path, check: bool) -> Result<()> {
    let root = shipwright::context::resolve_root(dir)?;

    if check {
        let drift = image::check(&root, cfg)?;
        if drift.is_empty() {
            info!("generated files match {}", config::CONFIG_FILE);
            return Ok(());
        }
        for file in &drift {
            print!("{}", file.diff);
        }
        let names: Vec<_> = drift.iter().map(|d| d.name).collect();
        return Err(HarnessError::Drift(names.join(", ")).into());
    }

    for path in image::write(&root, cfg)? {
        println!("{}", path.display());
    }
    Ok(())
}

/// In a foreground run the terminal's interrupt also reaches `docker run`,
/// which relays it to the container. Stay alive to report its exit status.
fn wait_through_interrupts(cfg: &Config) {
    if cfg.detach {
        return;
    }
    if let Err(e) = ctrlc::set_handler(|| info!("interrupt received, waiting for the container to stop")) {
        tracing::debug!("could not install interrupt handler: {e}");
    }
}

fn print_run_report(report: &RunReport) {
    if let RunReport::Detached { container_id, .. } = report {
        println!("{container_id}");
    }
}

fn entrypoint(forwarded: &[OsString]) -> ExitCode {
    match Entrypoint::from_env(&Config::default()).and_then(|ep| ep.start(forwarded)) {
        Ok(code) => exit_code(code),
        Err(e) => {
            error!(step = %e.step(), "{e}");
            exit_code(e.exit_code())
        }
    }
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<HarnessError>() {
        Some(harness) => {
            error!(step = %harness.step(), "{err:#}");
            exit_code(harness.exit_code())
        }
        None => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code)
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}
