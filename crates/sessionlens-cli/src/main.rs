//! sessionlens-cli: query sessions and dialogs straight from the GraphQL API.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod print;
mod queries;


use clap::Parser;

use args::{Cli, Commands};
use client::{CliError, build_ctx_from_cli};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;

    let result = match &cli.command {
        Commands::Sessions(args) => handlers::sessions(&ctx, args).await?,
        Commands::Dialogs(args) => handlers::dialogs(&ctx, args).await?,
        Commands::DialogsFor(args) => handlers::dialogs_for(&ctx, args).await?,
    };

    print::emit(&result, cli.pretty, cli.output.as_deref()).await
}
