//! RoriCode CLI - terminal coding assistant
//!
//! Provides the `roricode` command: an interactive chat front-end over the
//! orchestration core, plus profile management for completion endpoints.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::types::ProfileCommand;
use commands::{chat, profile};

/// RoriCode - a coding assistant in your terminal
///
/// Running `roricode` without a subcommand starts a chat with the active profile.
#[derive(Parser, Debug)]
#[command(name = "roricode", author, version, about = "RoriCode - a coding assistant in your terminal")]
struct Args {
    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides it.
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a chat with the active profile
    Chat,

    /// Switch to a profile and start a chat
    Use {
        /// Profile name
        name: String,
    },

    /// Manage API profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

/// Logs go to stderr so they never interleave with the transcript on stdout.
fn init_tracing(level: &str) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false);

    if std::env::var_os("RUST_LOG").is_some() {
        tracing::subscriber::set_global_default(
            builder.with_env_filter(EnvFilter::from_default_env()).finish(),
        )?;
    } else {
        tracing::subscriber::set_global_default(builder.with_max_level(parse_level(level)).finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    match args.command {
        None | Some(Command::Chat) => chat::execute(None).await,
        Some(Command::Use { name }) => chat::execute(Some(name)).await,
        Some(Command::Profile(command)) => profile::execute(command),
    }
}
