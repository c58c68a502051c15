use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scratch::{Database, ScratchConfig};
use tracing::{info, Level};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.scratch/scratch.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scratch server
    Serve {
        /// Override the configured listen port
        #[clap(short, long)]
        port: Option<u16>,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    info!("Loading config...");

    let mut config = ScratchConfig::new(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }

            info!("Connecting to database...");

            let db = Database::open(&config.sqlite_path())?;

            scratch::start_server(Arc::new(db), &config).await?;
        }
        Commands::Config => {
            println!("{}", config.summary());
        }
    }

    Ok(())
}
