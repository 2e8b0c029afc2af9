use crate::domain::process::ProcessStatus;
use crate::domain::request::RequestStatus;
use thiserror::Error;

/// Coarse classification of a failure, used by the presentation layer to decide
/// how to surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Precondition,
    InvalidState,
    NotReady,
    Conflict,
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum TaarufError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("You need to be signed in to do that")]
    Unauthenticated,
    #[error("There is no active taaruf process")]
    NoActiveProcess,
    #[error("Cannot {action} while the process is {status}")]
    InvalidTransition {
        action: &'static str,
        status: ProcessStatus,
    },
    #[error("Request {id} is already {status}")]
    RequestResolved { id: String, status: RequestStatus },
    #[error("Request {0} is outgoing and can only be resolved by its recipient")]
    NotIncoming(String),
    #[error("Progress is {progress}%, at least {required}% is needed before requesting a nadzor")]
    NotReady { progress: u8, required: u8 },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TaarufError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::Unauthenticated | Self::NoActiveProcess => ErrorKind::Precondition,
            Self::InvalidTransition { .. } | Self::RequestResolved { .. } | Self::NotIncoming(_) => {
                ErrorKind::InvalidState
            }
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StorageError(_) | Self::CsvError(_) | Self::IoError(_) | Self::JsonError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Short headline for the error notification raised when an operation is rejected.
    pub fn title(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "Invalid input",
            Self::Unauthenticated => "Not signed in",
            Self::NoActiveProcess => "No active taaruf",
            Self::InvalidTransition { .. } | Self::RequestResolved { .. } | Self::NotIncoming(_) => {
                "Action not allowed"
            }
            Self::NotReady { .. } => "Process not ready",
            Self::Conflict(_) => "Action conflicts with current state",
            Self::NotFound(_) => "Not found",
            _ => "Action failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, TaarufError>;
