#![cfg_attr(not(test), deny(clippy::panic))]

use castlink_server::api;
use castlink_server::config::{self, Config, MediaProviderKind};
use castlink_server::logging;
use castlink_server::server::CastlinkServer;
use clap::Parser;
use std::net::SocketAddr;

/// Castlink -- matchmaking and chain-linking game server
#[derive(Parser, Debug)]
#[command(name = "castlink-server")]
#[command(about = "Matchmaking and turn-based chain-linking game server")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// The TMDB token is redacted.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

const REDACTED: &str = "<redacted>";

fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.media.tmdb_token.is_some() {
        config.media.tmdb_token = Some(REDACTED.to_string());
    }
    config
}

fn print_summary(config: &Config) {
    let provider = match config.media.provider {
        MediaProviderKind::Tmdb => "tmdb",
        MediaProviderKind::Static => "static",
    };
    println!("Configuration summary:");
    println!("  Port: {}", config.port);
    println!("  Storage backend: InMemory");
    println!("  Media provider: {provider}");
    println!(
        "  Game seed: {}",
        config
            .game
            .seed
            .as_ref()
            .map_or("<not configured>", |seed| seed.label.as_str())
    );
    println!(
        "  Lock budget: {} attempts x {}ms (lease {}ms)",
        config.matchmaking.lock_attempts,
        config.matchmaking.lock_retry_delay_ms,
        config.matchmaking.lock_lease_ms
    );
    println!(
        "  Room code length: {}",
        config.matchmaking.room_code_length
    );
    println!("  Room TTL: {}s", config.matchmaking.room_ttl_secs);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&redacted(&cfg))
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() only reports validation problems; startup refuses them.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                print_summary(&cfg);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting castlink server");

    let server = CastlinkServer::from_config(&cfg).await?;

    let cleanup_server = server.clone();
    tokio::spawn(async move {
        cleanup_server.cleanup_task().await;
    });

    let app = api::create_router(&cfg.server.cors_origins)
        .fallback(|| async { "Castlink server. See /health, /metrics and /v1/*." })
        .with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.server.cors_origins,
        "Server started over HTTP"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
