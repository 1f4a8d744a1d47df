//! promptsync CLI - push and pull desktop prompts from the terminal

mod cli;
mod commands;
mod error;
mod state;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::CommandContext;
use crate::commands::pull::{run_pull, PullOptions};
use crate::commands::status::run_status;
use crate::commands::upload::run_upload;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("promptsync=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let context = CommandContext::new(cli.api_url, cli.token, cli.state_path)?;
    tracing::debug!(api_url = context.api_url(), "Resolved sync server");

    match cli.command {
        Commands::Upload {
            file,
            session_id,
            json,
        } => run_upload(&context, &file, session_id, json).await?,
        Commands::Pull {
            full,
            offset,
            limit,
            all,
            json,
        } => {
            let options = PullOptions {
                full,
                offset,
                limit,
                all,
            };
            run_pull(&context, options, json).await?;
        }
        Commands::Status {
            history,
            limit,
            json,
        } => run_status(&context, history, limit, json).await?,
    }

    Ok(())
}
