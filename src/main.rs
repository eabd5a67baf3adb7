mod config;
mod launch;
mod liveness;
mod pid_record;
mod status;
mod supervisor;

use clap::{Args, Parser, Subcommand};
use config::{Overrides, SupervisorConfig};
use status::StatusReport;
use std::path::PathBuf;
use std::process::ExitCode;
use supervisor::Supervisor;
use tracing_subscriber::EnvFilter;

/// Exit status for configuration problems.
const EXIT_CONFIG: u8 = 5;

/// Launch a long-running service at most once, tracking it through a PID file.
#[derive(Parser, Debug)]
#[command(name = "pidwarden", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "pidwarden.toml", global = true)]
    config: PathBuf,

    /// Extra logging (pid checks, launch details)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the service unless a live instance is already recorded
    Start(StartArgs),
    /// Report whether the recorded instance is running
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct StartArgs {
    /// PID file path (overrides config)
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Directory for the service's stdout/stderr files (overrides config)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Program to run (overrides config)
    #[arg(long)]
    program: Option<String>,

    /// Print the resolved settings and command, don't launch
    #[arg(long)]
    dry_run: bool,

    /// Arguments appended to the configured ones
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// PID file path (overrides config)
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Print a JSON report
    #[arg(long)]
    json: bool,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    tracing::debug!(?cli, "parsed CLI arguments");

    let mut config = match SupervisorConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let code = match &cli.command {
        Commands::Start(args) => run_start(&mut config, args),
        Commands::Status(args) => run_status(&mut config, args),
    };
    ExitCode::from(code)
}

fn run_start(config: &mut SupervisorConfig, args: &StartArgs) -> u8 {
    config.apply_overrides(&Overrides {
        pid_file: args.pid_file.clone(),
        log_dir: args.log_dir.clone(),
        program: args.program.clone(),
        extra_args: args.args.clone(),
    });

    let command = match config.launch_command() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG;
        }
    };

    if args.dry_run {
        match config.to_toml() {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => tracing::warn!(error = %e, "failed to render config"),
        }
        println!("# command: {}", command.command_line());
        println!("Dry run mode, not launching.");
        return 0;
    }

    let supervisor = Supervisor::from_config(config);
    match supervisor.start(&command) {
        Ok(record) => {
            println!(
                "started {} (pid {}, pid file {})",
                command.program,
                record.pid(),
                record.path().display()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_status(e.exit_code())
        }
    }
}

fn run_status(config: &mut SupervisorConfig, args: &StatusArgs) -> u8 {
    config.apply_overrides(&Overrides {
        pid_file: args.pid_file.clone(),
        ..Default::default()
    });

    let supervisor = Supervisor::from_config(config);
    let status = match supervisor.status() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_status(e.exit_code());
        }
    };

    let report = StatusReport::new(supervisor.pid_file(), status, supervisor.probe_name());
    if args.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: failed to serialize status: {e}");
                return 1;
            }
        }
    } else {
        println!("{}", report.summary());
    }
    exit_status(report.exit_code())
}

fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
