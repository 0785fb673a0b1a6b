use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;
mod render;
mod upgrade;

use commands::{
    open_layout, run_list_command, run_outdated_command, run_upgrade_command, UpgradeArgs,
};
use error::UpgradeError;
use render::current_output_style;

#[derive(Parser, Debug)]
#[command(name = "portup")]
#[command(about = "Rebuild installed ports against their local definitions", long_about = None)]
struct Cli {
    /// Installation root (defaults to PORTUP_ROOT, then ~/.portup).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild outdated packages. Only prints the plan unless --no-dry-run is given.
    Upgrade {
        /// Packages to upgrade, as `name` or `name:triplet`. Defaults to every outdated package.
        specs: Vec<String>,
        #[arg(long)]
        no_dry_run: bool,
        /// Attempt every action even after a failure.
        #[arg(long)]
        keep_going: bool,
        /// Triplet for specs written without one.
        #[arg(long)]
        triplet: Option<String>,
    },
    List {
        #[arg(long)]
        json: bool,
    },
    Outdated {
        #[arg(long)]
        json: bool,
    },
    Completions {
        shell: Shell,
    },
    Version,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<UpgradeError>() {
            Some(UpgradeError::PreviewOnly) => {
                ExitCode::from(UpgradeError::PreviewOnly.exit_code())
            }
            Some(upgrade_err) => {
                eprintln!("error: {err:#}");
                ExitCode::from(upgrade_err.exit_code())
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Upgrade {
            specs,
            no_dry_run,
            keep_going,
            triplet,
        } => {
            let layout = open_layout(cli.root)?;
            let args = UpgradeArgs {
                specs,
                no_dry_run,
                keep_going,
                triplet,
            };
            run_upgrade_command(&layout, args, current_output_style(), &mut out)?;
        }
        Commands::List { json } => {
            let layout = open_layout(cli.root)?;
            run_list_command(&layout, json, &mut out)?;
        }
        Commands::Outdated { json } => {
            let layout = open_layout(cli.root)?;
            run_outdated_command(&layout, json, &mut out)?;
        }
        Commands::Completions { shell } => {
            write_completions_script(shell, &mut out)?;
        }
        Commands::Version => {
            writeln!(out, "portup {}", env!("CARGO_PKG_VERSION"))?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PORTUP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_completions_script<W: Write>(shell: Shell, writer: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let mut generated = Vec::new();
    clap_complete::generate(shell, &mut command, "portup", &mut generated);
    writer
        .write_all(&generated)
        .with_context(|| "failed writing generated completion script")?;
    Ok(())
}
