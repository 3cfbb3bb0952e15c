use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    FreighterError(#[from] freighter_core::Error),

    #[error("sqlx error: {0}")]
    SQLXError(#[from] sqlx::Error),
    #[error("sqlx migration error: {0}")]
    SQLXMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sea-query error: {0}")]
    SeaQueryError(#[from] sea_query::error::Error),

    // metadata errors
    #[error("SqliteMetadataTx already rolled back or committed")]
    SqliteMetadataTxInactive,
}

impl From<Error> for freighter_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::FreighterError(e) => e,
            Error::SQLXError(sqlx::Error::RowNotFound) => {
                freighter_core::Error::NotFound(String::from("row not found"))
            }
            e => freighter_core::Error::StorageFault(format!("{e}")),
        }
    }
}
