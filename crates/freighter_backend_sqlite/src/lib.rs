mod errors;
mod manifests;
mod metadata;

pub use errors::{Error, Result};
pub use manifests::SqliteManifestStore;
pub use metadata::SqliteConfig;
