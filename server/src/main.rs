use clap::Parser;
use log::info;
use server::config::{ServerConfig, WordCatalog};
use server::network::Server;
use shared::{DEFAULT_PORT, MAX_PLAYERS};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// JSON file with the words to draw, e.g. {"words": ["apple", "tree"]}
    #[arg(short, long)]
    words: Option<PathBuf>,

    /// Maximum number of players
    #[arg(short, long, default_value_t = MAX_PLAYERS)]
    max_players: usize,

    /// Milliseconds between liveness checks
    #[arg(long, default_value = "2000")]
    check_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ServerConfig {
        host: args.host,
        port: args.port,
        max_players: args.max_players,
        ..ServerConfig::default()
    };
    config.liveness.interval = Duration::from_millis(args.check_interval_ms);

    if let Some(path) = args.words {
        let catalog = WordCatalog::load(&path)?;
        info!("Loaded {} words from {}", catalog.words.len(), path.display());
        config.words = catalog.words;
    }

    let mut server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
