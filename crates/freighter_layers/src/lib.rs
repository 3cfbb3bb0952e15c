//! gRPC access to individual files inside container image layers.
//!
//! Layers are gzip-compressed tar archives stored as plain files directly under a root directory;
//! the file name is the layer identifier. Clients read one entry with `GetFile` or list a layer's
//! entries (or the root itself) with `GetDir`, without pulling whole layers.
pub mod archive;

mod errors;
pub use errors::{Error, Result};

pub mod proto;

mod service;
pub use service::{serve, serve_with_listener, DirListingMode, LayerAccessService};
