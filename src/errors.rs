use sea_orm::error::DbErr;
use serde::Serialize;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Document {0} is already cancelled")]
    AlreadyCancelled(i64),

    #[error("Duplicate document number: {0}")]
    DuplicateNumber(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether retrying the whole operation can succeed without caller-side
    /// changes. Only the numbering race qualifies: a retry generates a fresh
    /// number.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::DuplicateNumber(_))
    }
}
