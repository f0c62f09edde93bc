//! Filter and sort pipeline for voucher lists.
//!
//! Stages run in a fixed order: text search, status filter, type filter, sort. The
//! whole collection is re-derived on every call.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::contract::model::{DiscountType, Voucher, VoucherStatus};
use crate::domain::status;

/// Case-insensitive substring search over code, discount type and amount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn new(term: impl Into<String>) -> Self {
        Self(term.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn matches(&self, voucher: &Voucher) -> bool {
        if self.is_empty() {
            return true;
        }
        let needle = self.0.to_lowercase();
        [
            voucher.code.to_lowercase(),
            voucher.discount_type.as_str().to_string(),
            format_amount(voucher.discount_amount),
        ]
        .iter()
        .any(|field| field.contains(&needle))
    }
}

/// Shortest string that round-trips, spelled the way a browser prints numbers:
/// `50.0` is `"50"`, `1e21` is `"1e+21"`, `1e-7` is `"1e-7"`.
pub fn format_amount(amount: f64) -> String {
    if amount == 0.0 {
        return "0".to_string();
    }
    if amount.is_infinite() {
        return if amount > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = amount.abs();
    if amount.is_nan() || (1e-6..1e21).contains(&magnitude) {
        return amount.to_string();
    }
    let exp = format!("{amount:e}");
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
        _ => exp,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(VoucherStatus),
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(Self::All),
            other => other.parse().map(Self::Only),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    Only(DiscountType),
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(Self::All),
            other => other.parse().map(Self::Only),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Code,
    DiscountAmount,
    DiscountType,
    ExpiryDate,
    Status,
}

impl SortKey {
    /// Column name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::DiscountAmount => "discountAmount",
            Self::DiscountType => "discountType",
            Self::ExpiryDate => "expiryDate",
            Self::Status => "status",
        }
    }

    fn compare(&self, a: &Voucher, b: &Voucher, today: NaiveDate) -> Ordering {
        match self {
            Self::Code => a.code.to_lowercase().cmp(&b.code.to_lowercase()),
            Self::DiscountAmount => a.discount_amount.total_cmp(&b.discount_amount),
            Self::DiscountType => a.discount_type.as_str().cmp(b.discount_type.as_str()),
            // `None` orders before every date
            Self::ExpiryDate => a.expiry_date.cmp(&b.expiry_date),
            Self::Status => status::resolve(a, today).cmp(&status::resolve(b, today)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "discountAmount" => Ok(Self::DiscountAmount),
            "discountType" => Ok(Self::DiscountType),
            "expiryDate" => Ok(Self::ExpiryDate),
            "status" => Ok(Self::Status),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// Current sort column and direction; `key == None` keeps the incoming order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn by(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    /// Same column flips the direction; a different column starts ascending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == Some(key) {
            self.direction = self.direction.flipped();
        } else {
            self.key = Some(key);
            self.direction = SortDirection::Asc;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub search: SearchTerm,
    pub status: StatusFilter,
    pub discount_type: TypeFilter,
    pub sort: SortState,
}

impl ListQuery {
    fn keeps(&self, voucher: &Voucher, today: NaiveDate) -> bool {
        if !self.search.matches(voucher) {
            return false;
        }
        if let StatusFilter::Only(wanted) = self.status {
            if status::resolve(voucher, today) != wanted {
                return false;
            }
        }
        if let TypeFilter::Only(wanted) = self.discount_type {
            if voucher.discount_type != wanted {
                return false;
            }
        }
        true
    }
}

/// Run the pipeline over `vouchers`; ties keep their incoming order.
pub fn apply(vouchers: &[Voucher], query: &ListQuery, today: NaiveDate) -> Vec<Voucher> {
    let mut rows: Vec<Voucher> = vouchers
        .iter()
        .filter(|v| query.keeps(v, today))
        .cloned()
        .collect();

    if let Some(key) = query.sort.key {
        rows.sort_by(|a, b| {
            let ord = key.compare(a, b, today);
            match query.sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
    rows
}
