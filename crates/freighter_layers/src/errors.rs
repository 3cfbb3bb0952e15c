use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid layer identifier: {0:?}")]
    InvalidLayerId(String),

    #[error("layer not found: {0}")]
    LayerNotFound(String),

    #[error("corrupt layer archive {layer}: {source}")]
    CorruptArchive {
        layer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file {path} not found in layer {layer}")]
    EntryNotFound { layer: String, path: String },

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("{0}")]
    TokioJoinError(#[from] tokio::task::JoinError),

    #[error("transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),
}

impl Error {
    /// Whether the error means the requested content is absent, as opposed to a fault reading it.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::LayerNotFound(_) | Error::CorruptArchive { .. } | Error::EntryNotFound { .. }
        )
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> tonic::Status {
        match e {
            Error::InvalidLayerId(_) => tonic::Status::invalid_argument(format!("{e}")),
            e if e.is_not_found() => tonic::Status::not_found(format!("{e}")),
            e => tonic::Status::internal(format!("{e}")),
        }
    }
}
