use thiserror::Error;

#[derive(Error, Debug)]
pub enum CivicDeskError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized access")]
    Unauthorized,

    #[error("forbidden access")]
    Forbidden,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
