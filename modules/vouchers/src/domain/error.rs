use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Domain-specific errors using thiserror
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Voucher not found: {id}")]
    VoucherNotFound { id: Uuid },

    #[error("Voucher code '{code}' already exists")]
    CodeAlreadyExists { code: String },

    #[error("Voucher code cannot be empty")]
    EmptyCode,

    #[error("Voucher code too long: {len} characters (max: {max})")]
    CodeTooLong { len: usize, max: usize },

    #[error("Discount amount must be a positive number")]
    NonPositiveAmount,

    #[error("Percentage discount cannot be more than 100% (got {amount})")]
    PercentageOutOfRange { amount: f64 },

    #[error("Expiry date {date} is in the past")]
    ExpiryInPast { date: NaiveDate },

    #[error("Select at least one voucher to delete")]
    EmptySelection,

    #[error("Too many ids in one request: {count} (max: {max})")]
    TooManyIds { count: usize, max: usize },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn voucher_not_found(id: Uuid) -> Self {
        Self::VoucherNotFound { id }
    }

    pub fn code_already_exists(code: impl Into<String>) -> Self {
        Self::CodeAlreadyExists { code: code.into() }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Wire name of the offending field, for field-level error reporting.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::CodeAlreadyExists { .. } | Self::EmptyCode | Self::CodeTooLong { .. } => {
                Some("code")
            }
            Self::NonPositiveAmount | Self::PercentageOutOfRange { .. } => Some("discountAmount"),
            Self::ExpiryInPast { .. } => Some("expiryDate"),
            Self::EmptySelection | Self::TooManyIds { .. } => Some("ids"),
            Self::Validation { field, .. } => Some(field.as_str()),
            Self::VoucherNotFound { .. } | Self::Database { .. } => None,
        }
    }
}
