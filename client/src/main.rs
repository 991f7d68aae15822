use anyhow::Result;
use clap::Parser;

use reqbouncer::{Client, Config};

#[derive(Parser)]
#[command(name = "reqbouncer")]
#[command(about = "Expose a local HTTP server through a reqbouncer relay", long_about = None)]
struct Cli {
    /// Local host:port that forwarded requests are replayed against
    #[arg(short, long, default_value = "localhost:8080")]
    target: String,

    /// Relay host:port
    #[arg(short, long)]
    server: String,

    /// Upgrade path on the relay
    #[arg(long, default_value = "/_websocket")]
    path: String,

    /// Bearer token presented to the relay
    #[arg(long)]
    access_token: String,

    /// Dial the relay over TLS
    #[arg(long)]
    secure: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let client = Client::new(Config {
        target: cli.target,
        server: cli.server,
        path: cli.path,
        access_token: cli.access_token,
        secure: cli.secure,
    })?;

    tokio::select! {
        result = client.listen() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
