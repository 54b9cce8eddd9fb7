// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Exit code for failures outside the library error taxonomy
const EXIT_FAILURE: i32 = 1;

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            config,
            output,
            json,
        } => commands::cmd_build(&config, output, json),
        Commands::Check { config } => commands::cmd_check(&config),
        Commands::Inspect {
            archive,
            json,
            kind,
        } => commands::cmd_inspect(&archive, json, kind),
        Commands::Relocate {
            archive,
            rules,
            output,
        } => commands::cmd_relocate(&archive, &rules, &output),
        Commands::Init {
            dir,
            main_class,
            force,
        } => commands::cmd_init(&dir, &main_class, force),
    }
}

/// Map an error to a process exit code by its library category
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<shadepack::Error>())
        .map(|e| e.category().exit_code())
        .unwrap_or(EXIT_FAILURE)
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; -v raises the default to debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}
