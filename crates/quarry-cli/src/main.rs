#![forbid(unsafe_code)]

//! Quarry CLI
//!
//! Emits index mappings for schema descriptions and runs index lifecycle
//! strategies against a cluster. A schema validation failure exits with
//! code 2 after writing the aggregated report to stderr; any other failure
//! exits with code 1.

use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Command};
use commands::Loaded;

const EXIT_FAILURE: u8 = 1;
const EXIT_VALIDATION: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over -v
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => exit_code(&e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings.as_deref();
    match cli.command {
        Command::Emit {
            target,
            create_request,
        } => {
            let loaded = Loaded::load(settings, &target)?;
            let output = commands::emit(&loaded, create_request)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Validate { target } => {
            let loaded = Loaded::load(settings, &target)?;
            commands::validate(&loaded).await?;
        }
        Command::Start {
            target,
            strategy,
            dry_run,
        } => {
            let loaded = Loaded::load(settings, &target)?;
            if dry_run {
                for request in commands::dry_run(&loaded, strategy).await? {
                    println!("{request}");
                }
            } else {
                let report = commands::start(&loaded, strategy).await?;
                for line in commands::describe(&report) {
                    println!("{line}");
                }
            }
        }
        Command::Stop { target, strategy } => {
            let loaded = Loaded::load(settings, &target)?;
            commands::stop(&loaded, strategy).await?;
            tracing::info!(index = loaded.identity.base(), "Stopped");
        }
    }
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<quarry_core::Error>() {
        Some(quarry_core::Error::Validation(report)) => {
            eprintln!("Schema validation failed with {} failure(s):", report.len());
            eprintln!("{report}");
            ExitCode::from(EXIT_VALIDATION)
        }
        _ => {
            tracing::error!("{error:#}");
            eprintln!("Error: {error:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
