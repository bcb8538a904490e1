use std::path::PathBuf;

use clap::Parser;
use ricefield::prelude::*;

/// Ricefield game server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on. Overrides the config file.
    #[arg(short, long)]
    bind: Option<String>,

    /// JSON server config. Every field is optional.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file for accounts and match history. Without it, everything
    /// lives in memory and is gone on exit.
    #[arg(short, long)]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    match args.data {
        Some(path) => {
            tracing::info!(path = %path.display(), "using file-backed accounts");
            serve(config, FileGateway::open(path).await?).await
        }
        None => {
            tracing::info!("using in-memory accounts");
            serve(config, InMemoryGateway::new()).await
        }
    }
}

async fn serve<G: PersistenceGateway>(
    config: ServerConfig,
    gateway: G,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = RicefieldServerBuilder::new()
        .config(config)
        .build(gateway)
        .await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    tokio::select! {
        result = server.run() => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
