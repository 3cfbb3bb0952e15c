mod sqlite;
pub use sqlite::SqliteConfig;
pub use sqlite::SqliteMetadataPool;

mod types;
pub use types::{ManifestRow, Manifests};
