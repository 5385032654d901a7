use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cmd::{self, chat::ChatArgs, validate::ValidateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "botflow",
    about = "Tooling for declarative bot conversation specs",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a bot spec for load-time errors
    Validate(ValidateArgs),
    /// Talk to a bot spec locally with in-memory stores
    #[command(
        long_about = "Talk to a bot spec locally with in-memory stores. Each stdin line is sent \
as a message; lines starting with `cb ` send the rest as a callback token."
    )]
    Chat(ChatArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Validate(args) => cmd::validate::run(args),
        Commands::Chat(args) => cmd::chat::run(args),
    }
}

/// Logs go to stderr so replies on stdout stay readable.
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
