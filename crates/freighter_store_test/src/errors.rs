use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    CoreError(#[from] freighter_core::Error),

    #[error("{0}")]
    TokioJoinError(#[from] tokio::task::JoinError),

    #[error("expected {expected}, got {actual}")]
    UnexpectedOutcome { expected: String, actual: String },
}
