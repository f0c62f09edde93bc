//! Voucher status resolution.

use chrono::{DateTime, NaiveDate, Utc};

use crate::contract::model::{Voucher, VoucherStatus};

/// Classify `voucher` as of `today`.
///
/// `is_active == false` always wins. Otherwise a voucher is expired only when its expiry
/// date is strictly before `today`, so a voucher expiring today is still active.
pub fn resolve(voucher: &Voucher, today: NaiveDate) -> VoucherStatus {
    resolve_parts(voucher.is_active, voucher.expiry_date, today)
}

pub fn resolve_parts(
    is_active: bool,
    expiry_date: Option<NaiveDate>,
    today: NaiveDate,
) -> VoucherStatus {
    if !is_active {
        return VoucherStatus::Inactive;
    }
    match expiry_date {
        Some(expiry) if expiry < today => VoucherStatus::Expired,
        _ => VoucherStatus::Active,
    }
}

/// Parse an expiry date given as `YYYY-MM-DD` or RFC 3339 (the offset is dropped).
pub fn parse_expiry(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD or RFC 3339"))
}

/// Current UTC calendar date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
