// refrecon - referral reconciliation runs from the command line

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "refrecon")]
#[command(about = "Reconcile referrals against rewards, transactions and event logs")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the source CSVs, profile them and write the final report
    #[command(after_help = "\
Examples:
  refrecon run recon.toml
  refrecon run recon.toml --json
  refrecon run --input data/ --output out/
  REFRECON_INPUT=data/ REFRECON_OUTPUT=out/ refrecon run

Relative directories in the config resolve against the config file's directory.
Invalid referrals are reported in the output, not through the exit code.")]
    Run {
        /// Path to a .toml run config (optional when --input and --output are given)
        config: Option<PathBuf>,

        /// Directory holding the source CSVs (overrides the config)
        #[arg(long, env = "REFRECON_INPUT")]
        input: Option<PathBuf>,

        /// Directory for profiles and the final report (overrides the config)
        #[arg(long, env = "REFRECON_OUTPUT")]
        output: Option<PathBuf>,

        /// Print the run summary as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a run config without running it
    #[command(after_help = "\
Examples:
  refrecon validate recon.toml")]
    Validate {
        /// Path to the .toml run config
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  referral-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Error returned by command handlers; `main` turns it into the process exit code.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, input, output, json } => recon::cmd_run(config, input, output, json),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = e.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(e.code)
        }
    }
}
