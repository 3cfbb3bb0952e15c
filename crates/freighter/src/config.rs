use std::path::PathBuf;

use serde::Deserialize;

use freighter_backend_sqlite::SqliteConfig;
use freighter_layers::DirListingMode;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub manifests: ManifestBackend,
    pub layers: LayersConfig,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ManifestBackend {
    Memory,
    Sqlite(SqliteConfig),
}

#[derive(Clone, Deserialize)]
pub struct LayersConfig {
    pub root: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub listing: DirListingMode,
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    50051
}
