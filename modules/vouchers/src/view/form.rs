use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::contract::client::VouchersApi;
use crate::contract::error::VouchersError;
use crate::contract::model::{DiscountType, NewVoucher, Voucher, VoucherPatch};
use crate::domain::status;

pub const CODE_EMPTY: &str = "Voucher code cannot be empty.";
pub const AMOUNT_NOT_POSITIVE: &str = "Discount amount must be a positive number.";
pub const PERCENTAGE_TOO_HIGH: &str = "Percentage discount cannot be more than 100%.";
pub const EXPIRY_IN_PAST: &str = "Expiry date cannot be in the past.";
pub const EXPIRY_INVALID: &str = "Expiry date must be a valid date (YYYY-MM-DD).";
pub const CODE_IN_USE: &str = "This voucher code is already in use. Please use a different code.";
pub const CREATE_FAILED: &str = "Failed to create voucher. Please try again.";
pub const UPDATE_FAILED: &str = "Failed to update voucher. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    /// Shown above the form.
    pub general: Option<String>,
    /// Shown under the code input.
    pub code: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.general.is_none() && self.code.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Validation failed locally; nothing was sent.
    Blocked,
    Saved(Voucher),
    Failed,
}

/// Create/edit form with raw input strings, as typed.
#[derive(Debug, Clone)]
pub struct VoucherForm {
    mode: FormMode,
    pub code: String,
    pub discount_amount: String,
    pub discount_type: DiscountType,
    /// Empty means no expiry.
    pub expiry_date: String,
    pub is_active: bool,
    is_submitting: bool,
    errors: FormErrors,
}

struct Parsed {
    code: String,
    amount: f64,
    expiry: Option<NaiveDate>,
}

impl VoucherForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            code: String::new(),
            discount_amount: String::new(),
            discount_type: DiscountType::Percentage,
            expiry_date: String::new(),
            is_active: true,
            is_submitting: false,
            errors: FormErrors::default(),
        }
    }

    /// Prefilled from an existing voucher.
    pub fn edit(voucher: &Voucher) -> Self {
        Self {
            mode: FormMode::Edit(voucher.id),
            code: voucher.code.clone(),
            discount_amount: voucher.discount_amount.to_string(),
            discount_type: voucher.discount_type,
            expiry_date: voucher
                .expiry_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            is_active: voucher.is_active,
            is_submitting: false,
            errors: FormErrors::default(),
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.errors = FormErrors::default();
    }

    pub fn set_discount_amount(&mut self, amount: impl Into<String>) {
        self.discount_amount = amount.into();
        self.errors = FormErrors::default();
    }

    pub fn set_discount_type(&mut self, kind: DiscountType) {
        self.discount_type = kind;
        self.errors = FormErrors::default();
    }

    pub fn set_expiry_date(&mut self, date: impl Into<String>) {
        self.expiry_date = date.into();
        self.errors = FormErrors::default();
    }

    pub fn set_is_active(&mut self, is_active: bool) {
        self.is_active = is_active;
        self.errors = FormErrors::default();
    }

    /// Pre-submit checks; the first failing rule becomes the general error.
    pub fn validate(&mut self, today: NaiveDate) -> bool {
        match self.parse(today) {
            Ok(_) => {
                self.errors.general = None;
                true
            }
            Err(msg) => {
                self.errors.general = Some(msg.to_string());
                false
            }
        }
    }

    fn parse(&self, today: NaiveDate) -> Result<Parsed, &'static str> {
        let code = self.code.trim();
        if code.is_empty() {
            return Err(CODE_EMPTY);
        }
        let amount = self
            .discount_amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or(AMOUNT_NOT_POSITIVE)?;
        if self.discount_type == DiscountType::Percentage && amount > 100.0 {
            return Err(PERCENTAGE_TOO_HIGH);
        }
        let expiry = match self.expiry_date.trim() {
            "" => None,
            raw => Some(status::parse_expiry(raw).map_err(|_| EXPIRY_INVALID)?),
        };
        if let (FormMode::Create, Some(date)) = (self.mode, expiry) {
            if date < today {
                return Err(EXPIRY_IN_PAST);
            }
        }
        Ok(Parsed {
            code: code.to_uppercase(),
            amount,
            expiry,
        })
    }

    pub async fn submit(&mut self, api: &dyn VouchersApi) -> SubmitOutcome {
        self.submit_at(api, status::today()).await
    }

    /// Validates, then creates or updates through `api`. `is_submitting` is reset
    /// whatever the outcome.
    pub async fn submit_at(&mut self, api: &dyn VouchersApi, today: NaiveDate) -> SubmitOutcome {
        self.errors = FormErrors::default();
        let parsed = match self.parse(today) {
            Ok(p) => p,
            Err(msg) => {
                self.errors.general = Some(msg.to_string());
                return SubmitOutcome::Blocked;
            }
        };

        self.is_submitting = true;
        let result = match self.mode {
            FormMode::Create => {
                api.create_voucher(NewVoucher {
                    code: parsed.code,
                    discount_amount: parsed.amount,
                    discount_type: self.discount_type,
                    expiry_date: parsed.expiry,
                    is_active: self.is_active,
                })
                .await
            }
            FormMode::Edit(id) => {
                let patch = VoucherPatch {
                    code: Some(parsed.code),
                    discount_amount: Some(parsed.amount),
                    discount_type: Some(self.discount_type),
                    expiry_date: Some(parsed.expiry),
                    is_active: Some(self.is_active),
                };
                api.update_voucher(id, patch).await
            }
        };
        self.is_submitting = false;

        match result {
            Ok(voucher) => {
                self.code = voucher.code.clone();
                SubmitOutcome::Saved(voucher)
            }
            Err(VouchersError::CodeConflict { .. }) => {
                self.errors.code = Some(CODE_IN_USE.to_string());
                SubmitOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, mode = ?self.mode, "Voucher form submission failed");
                let msg = match self.mode {
                    FormMode::Create => CREATE_FAILED,
                    FormMode::Edit(_) => UPDATE_FAILED,
                };
                self.errors.general = Some(msg.to_string());
                SubmitOutcome::Failed
            }
        }
    }
}
