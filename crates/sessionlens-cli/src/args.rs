//! Command-line surface for `sessionlens-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_ENDPOINT: &str = "https://api-llm-internal.prd.alva.xyz/query";
pub const DEFAULT_WINDOW_END: i64 = 4_102_416_000;

#[derive(Parser, Debug)]
#[command(
    name = "sessionlens-cli",
    version,
    about = "Query sessions and dialogs from the GraphQL API",
    long_about = None
)]
pub struct Cli {
    /// GraphQL endpoint URL
    #[arg(long, env = "SESSIONLENS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Path to file containing the authorization token (takes precedence over env)
    #[arg(long, env = "ALVA_API_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Token from env (CLI flag intentionally disabled to avoid shell history leaks)
    #[arg(hide = true, env = "ALVA_API_TOKEN")]
    pub token_env: Option<String>,

    /// Pretty print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Write output to file instead of stdout
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List sessions created within a time window
    Sessions(SessionsArgs),
    /// Dialogs of a single session
    Dialogs(DialogsArgs),
    /// Dialogs of several sessions, grouped by session id
    DialogsFor(DialogsForArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SessionsArgs {
    /// Start of the creation window (Unix seconds)
    #[arg(long)]
    pub start: i64,
    /// End of the creation window (Unix seconds)
    #[arg(long)]
    pub end: i64,
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
    /// Include admin sessions
    #[arg(long)]
    pub show_admin: bool,
    /// Include deleted sessions
    #[arg(long)]
    pub show_deleted: bool,
    /// Also fetch the dialogs of every listed session
    #[arg(long)]
    pub include_dialogs: bool,
    /// Maximum dialogs per session
    #[arg(long, default_value_t = 100)]
    pub dialog_limit: u32,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct WindowArgs {
    /// Start of the creation window (Unix seconds)
    #[arg(long, default_value_t = 0)]
    pub start: i64,
    /// End of the creation window (Unix seconds)
    #[arg(long, default_value_t = DEFAULT_WINDOW_END)]
    pub end: i64,
    /// Maximum dialogs per session
    #[arg(long, default_value_t = 100)]
    pub limit: u32,
}

#[derive(Args, Debug, Clone)]
pub struct DialogsArgs {
    /// Session id
    #[arg(long)]
    pub sid: String,
    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DialogsForArgs {
    /// Comma-separated session ids
    #[arg(long, value_delimiter = ',', required = true)]
    pub session_ids: Vec<String>,
    #[command(flatten)]
    pub window: WindowArgs,
}
