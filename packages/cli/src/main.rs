use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use consulctl::commands;
use consulctl::commands::service::{ServiceArgs, ServiceEnv};
use consulctl::config::{AgentArgs, Settings};

#[derive(Parser)]
#[command(name = "consulctl", about = "For interacting with consul through your application")]
#[command(version, propagate_version = true, arg_required_else_help = true)]
struct Cli {
    #[command(flatten)]
    agent: AgentArgs,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// For managing your own service definition
    Service(ServiceArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_args(&cli.agent)?;
    debug!(base_url = %settings.base_url(), "Settings resolved");

    match cli.command {
        Commands::Service(args) => {
            commands::service::run(&settings, &args, &ServiceEnv::from_env()).await?;
        }
    }

    Ok(())
}
