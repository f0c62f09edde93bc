use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How `discount_amount` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountType {
    /// Amount is a percentage in (0, 100].
    Percentage,
    /// Amount is a currency value.
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown discount type '{other}'")),
        }
    }
}

/// Derived usability of a voucher; never stored.
///
/// `Ord` follows the lexical order of the labels: `active < expired < inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VoucherStatus {
    Active,
    Expired,
    Inactive,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoucherStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown voucher status '{other}'")),
        }
    }
}

/// Voucher as seen by other modules (no serde, no schema).
#[derive(Debug, Clone, PartialEq)]
pub struct Voucher {
    pub id: Uuid,
    /// Always upper-case.
    pub code: String,
    pub discount_amount: f64,
    pub discount_type: DiscountType,
    /// `None` never expires.
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVoucher {
    pub code: String,
    pub discount_amount: f64,
    pub discount_type: DiscountType,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// Partial update. `expiry_date: Some(None)` clears the expiry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoucherPatch {
    pub code: Option<String>,
    pub discount_amount: Option<f64>,
    pub discount_type: Option<DiscountType>,
    pub expiry_date: Option<Option<NaiveDate>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkDeleteFailure {
    pub id: Uuid,
    pub reason: String,
}

/// Per-id outcome of a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkDeleteReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkDeleteFailure>,
}

impl BulkDeleteReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
