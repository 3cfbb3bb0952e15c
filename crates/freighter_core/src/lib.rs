pub mod errors;
pub use errors::{Error, ErrorKind, Result};

pub mod registry;
pub use registry::{validate_key, validate_repository, Manifest, ManifestStore, Reference};
