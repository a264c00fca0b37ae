mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scwflow")]
#[command(about = "Scaleway resource provider: declared state in, reconciled cloud out", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve provider requests, one JSON object per line on stdin
    Serve,
    /// Print the provider schema
    Schema {
        /// Only this resource or data source type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,
    },
    /// Delete every leftover resource of the managed kinds
    Sweep {
        /// Provider configuration block (JSON file); defaults to the scw profile file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Only this kind (e.g. block_volume, redis_cluster)
        #[arg(short, long)]
        kind: Option<String>,
        /// Give up after this many seconds
        #[arg(long, default_value = "1800")]
        timeout: u64,
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries RPC responses in serve mode; logs always go to stderr.
    let serving = matches!(cli.command, Commands::Serve);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(!serving)
        .init();

    match cli.command {
        Commands::Serve => commands::serve::handle().await,
        Commands::Schema { type_name } => commands::schema::handle(type_name.as_deref()),
        Commands::Sweep {
            config,
            kind,
            timeout,
            yes,
        } => commands::sweep::handle(config.as_deref(), kind.as_deref(), timeout, yes).await,
    }
}
