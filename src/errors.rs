use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::LoanStatus;

/// error classification surfaced across the RPC boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
    Aborted,
    Unauthenticated,
    PermissionDenied,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("invalid argument: {message}")]
    InvalidArgument {
        message: String,
    },

    #[error("not found: {message}")]
    NotFound {
        message: String,
    },

    #[error("loan is {status:?}: {message}")]
    InvalidLoanStatus {
        status: LoanStatus,
        message: String,
    },

    #[error("failed precondition: {message}")]
    FailedPrecondition {
        message: String,
    },

    #[error("calculation error: {message}")]
    Calculation {
        message: String,
    },

    #[error("store error: {message}")]
    Store {
        message: String,
    },

    #[error("transaction aborted after {attempts} conflicting attempts")]
    Aborted {
        attempts: u32,
    },

    #[error("caller is not authenticated")]
    Unauthenticated,

    #[error("caller is not an administrator")]
    PermissionDenied,

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl LedgerError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        LedgerError::NotFound { message: message.into() }
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        LedgerError::FailedPrecondition { message: message.into() }
    }

    pub fn calculation(message: impl Into<String>) -> Self {
        LedgerError::Calculation { message: message.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        LedgerError::Store { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::InvalidLoanStatus { .. } | LedgerError::FailedPrecondition { .. } => {
                ErrorKind::FailedPrecondition
            }
            LedgerError::Calculation { .. }
            | LedgerError::Store { .. }
            | LedgerError::InvalidConfiguration { .. } => ErrorKind::Internal,
            LedgerError::Aborted { .. } => ErrorKind::Aborted,
            LedgerError::Unauthenticated => ErrorKind::Unauthenticated,
            LedgerError::PermissionDenied => ErrorKind::PermissionDenied,
        }
    }

    /// stable code string for the RPC response
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::FailedPrecondition => "failed-precondition",
            ErrorKind::Internal => "internal",
            ErrorKind::Aborted => "aborted",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::PermissionDenied => "permission-denied",
        }
    }
}

/// json error body returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        let err = LedgerError::InvalidLoanStatus {
            status: LoanStatus::Pending,
            message: "payments require an approved loan".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(err.code(), "failed-precondition");
        assert_eq!(
            err.to_string(),
            "loan is Pending: payments require an approved loan"
        );

        assert_eq!(LedgerError::calculation("nan").kind(), ErrorKind::Internal);
        assert_eq!(LedgerError::store("disk").kind(), ErrorKind::Internal);
        assert_eq!(LedgerError::Aborted { attempts: 5 }.code(), "aborted");
        assert_eq!(LedgerError::PermissionDenied.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_error_response_body() {
        let err = LedgerError::not_found("loan abc");
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "not-found");
        assert_eq!(body.message, "not found: loan abc");
    }
}
