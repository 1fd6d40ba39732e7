//! `locator_service`: HTTP front end for the location engine, behind the
//! `service` Cargo feature.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use neic_locator::core::aux_cache::AuxCache;
use neic_locator::core::config::EngineConfig;
use neic_locator::core::engine::Engine;
use neic_locator::logging;
use neic_locator::server;

#[derive(Parser, Debug)]
#[command(name = "locator_service", version, about)]
struct Cli {
    /// Directory holding the craton polygon / zone-key / zone-stat reference
    /// files and the bincode cache.
    #[arg(long, default_value = "model")]
    model_path: PathBuf,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    #[arg(long)]
    log_path: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let log_level = cli
        .log_level
        .parse()
        .unwrap_or_else(|_| neic_locator::core::config::LogLevel::Info);
    if let Err(err) = logging::init(log_level, cli.log_path.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        return Err(std::io::Error::other(err.to_string()));
    }

    let cache_path = cli.model_path.join("aux.bin");
    let aux_cache = AuxCache::new(cache_path);
    let engine = Engine::with_ak135(
        EngineConfig::default(),
        &aux_cache,
        &cli.model_path.join("cratons.json"),
        &cli.model_path.join("zone.key"),
        &cli.model_path.join("zone.stat"),
    )
    .map_err(|e| std::io::Error::other(e.to_string()))?;

    server::serve(engine, cli.addr).await
}
