//! Storage Layer
//!
//! SQLite persistence with repository pattern: patients and their scan,
//! blink-test, and typing-test results.

mod repository;

pub use repository::{
    BlinkResultRecord, NewPatient, NewScan, PatientRecord, Repository, ScanRecord,
    TypingResultRecord,
};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
}
