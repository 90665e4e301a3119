//! Error types for Ledgerlink

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot link a ledger to itself")]
    SelfLink,

    #[error("Ledger not found: {0}")]
    LedgerNotFound(String),

    #[error("Ledger not active: {0}")]
    LedgerNotActive(String),

    #[error("Cross-owner link forbidden: {0} and {1} belong to different users")]
    CrossOwnerLink(String, String),

    #[error("Link already exists between {0} and {1}")]
    LinkAlreadyExists(String, String),

    #[error("Link not found: {0}")]
    LinkNotFound(String),

    #[error("Transaction already in target ledger: {0}")]
    AlreadyInLedger(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for validation failures a caller can fix by changing the request;
    /// false for persistence faults that need investigation.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Pool(_) | Self::Json(_))
    }
}
