use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no blob stored under `{0}`")]
    NotFound(String),
    #[error("invalid key `{0}`")]
    InvalidKey(String),
    #[error("unsupported store location `{0}`")]
    UnsupportedLocation(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}
