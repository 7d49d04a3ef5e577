use crate::domain::money::Money;
use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy of the engine.
///
/// Every variant belongs to one [`ErrorKind`]; callers that need to map
/// failures onto a transport (HTTP status, exit code) should go through
/// [`PaymentError::kind`] or [`PaymentError::status_code`] instead of matching
/// on individual variants.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Quote {0} has expired")]
    Expired(Uuid),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("External provider failure: {0}")]
    ExternalFailure(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Conflict,
    External,
    Internal,
}

impl PaymentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::InvalidAmount(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientFunds { .. } | Self::InvalidState(_) | Self::Expired(_) => {
                ErrorKind::State
            }
            Self::Conflict(_) | Self::InvalidFormat(_) => ErrorKind::Conflict,
            Self::ExternalFailure(_) => ErrorKind::External,
            Self::CsvError(_) | Self::IoError(_) | Self::InternalError(_) => ErrorKind::Internal,
            #[cfg(feature = "storage-rocksdb")]
            Self::StorageError(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::State => match self {
                Self::InsufficientFunds { .. } => 422,
                _ => 400,
            },
            ErrorKind::Conflict => 409,
            ErrorKind::External => 502,
            ErrorKind::Internal => 500,
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(error: serde_json::Error) -> Self {
        Self::InternalError(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
