use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use freighter_backend_memory::MemoryManifestStore;
use freighter_backend_sqlite::SqliteManifestStore;
use freighter_core::ManifestStore;
use freighter_layers::LayerAccessService;

mod config;
use crate::config::{Config, LayersConfig, ManifestBackend};

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut dev_config = File::open(cli.config_file.unwrap_or("./dev-config.yml".into()))?;
    let mut s = String::new();
    dev_config.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;

    // initialize persistence layer
    match config.manifests {
        ManifestBackend::Memory => run(MemoryManifestStore::new(), config.layers).await,
        ManifestBackend::Sqlite(cfg) => {
            let store = SqliteManifestStore::open(&cfg).await?;
            run(store, config.layers).await
        }
    }
}

/// Serve layers while holding `store` open, so the backend lives exactly as long as the server.
async fn run<S: ManifestStore>(store: S, layers: LayersConfig) -> Result<()> {
    tracing::info!("manifest store ready");

    let service = LayerAccessService::new(layers.root).with_listing_mode(layers.listing);
    let served = freighter_layers::serve(service, &layers.host, layers.port).await;

    tracing::info!("layer server stopped; closing manifest store");
    drop(store);
    Ok(served?)
}

#[cfg(test)]
mod test {
    use freighter_layers::DirListingMode;

    use super::*;

    #[tokio::test]
    async fn run_reports_bind_failures() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let layers = LayersConfig {
            root: PathBuf::from("."),
            host: String::from("127.0.0.1"),
            port,
            listing: DirListingMode::Lenient,
        };

        assert!(run(MemoryManifestStore::new(), layers).await.is_err());
    }
}
