use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Persistence,
    Busy,
    Timeout,
    Insight,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Busy => "busy",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Insight => "insight",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PersistenceError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("storage is full ({needed} bytes needed, quota is {quota} bytes)")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("stored journal data is corrupted: {0}")]
    Corrupted(String),
    #[error("an entry with id {0} already exists")]
    DuplicateId(Uuid),
    #[error("entry was not saved: {0}")]
    InvalidEntry(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WellnessError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("could not save your journal: {0}; please try again")]
    Persistence(#[from] PersistenceError),
    #[error("another entry is still being saved; wait for it to finish and try again")]
    Busy,
    #[error("{step} did not finish within {}ms; please try again", .after.as_millis())]
    Timeout { step: String, after: Duration },
    #[error("insight generation failed: {0}")]
    Insight(String),
}

impl WellnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WellnessError::Validation(_) => ErrorKind::Validation,
            WellnessError::Persistence(_) => ErrorKind::Persistence,
            WellnessError::Busy => ErrorKind::Busy,
            WellnessError::Timeout { .. } => ErrorKind::Timeout,
            WellnessError::Insight(_) => ErrorKind::Insight,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WellnessError::Persistence(_) | WellnessError::Timeout { .. } | WellnessError::Busy
        )
    }

    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        WellnessError::Persistence(PersistenceError::Unavailable(detail.to_string()))
    }
}
