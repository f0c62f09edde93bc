use thiserror::Error;
use uuid::Uuid;

/// Errors that are safe to expose to other modules and remote callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VouchersError {
    #[error("Voucher not found: {id}")]
    NotFound { id: Uuid },

    #[error("Voucher code '{code}' already exists")]
    CodeConflict { code: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Remote gateway only: the call did not produce a usable answer.
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Internal error")]
    Internal,
}

impl VouchersError {
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound { id }
    }

    pub fn code_conflict(code: impl Into<String>) -> Self {
        Self::CodeConflict { code: code.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }
}
