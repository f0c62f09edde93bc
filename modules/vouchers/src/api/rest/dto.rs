use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::contract::model::{
    BulkDeleteFailure, BulkDeleteReport, DiscountType, NewVoucher, Voucher, VoucherPatch,
    VoucherStatus,
};
use crate::domain::error::DomainError;
use crate::domain::listing::{ListQuery, SearchTerm, SortDirection, SortKey, SortState};
use crate::domain::status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountTypeDto {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatusDto {
    Active,
    Expired,
    Inactive,
}

/// REST representation of a voucher, with its status resolved at response time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoucherDto {
    pub id: Uuid,
    pub code: String,
    pub discount_amount: f64,
    pub discount_type: DiscountTypeDto,
    /// `YYYY-MM-DD`; absent or null means the voucher never expires.
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool,
    pub status: VoucherStatusDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create payload. Required fields are optional here so a missing one becomes a
/// problem document instead of an extractor rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoucherReq {
    pub code: Option<String>,
    pub discount_amount: Option<f64>,
    pub discount_type: Option<DiscountTypeDto>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp; the time of day is dropped.
    #[serde(default, deserialize_with = "expiry::deserialize")]
    #[schema(value_type = Option<String>, format = Date)]
    pub expiry_date: Option<NaiveDate>,
    /// Defaults to `true`.
    pub is_active: Option<bool>,
}

/// Partial update; `expiryDate: null` clears the expiry, an absent field keeps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVoucherReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<DiscountTypeDto>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "expiry::deserialize_patch"
    )]
    #[schema(value_type = Option<String>, format = Date)]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Query string of `GET /vouchers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVouchersQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub discount_type: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteReq {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteFailureDto {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteReportDto {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkDeleteFailureDto>,
}

/// Empty strings count as "no expiry".
mod expiry {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer};

    use crate::domain::status::parse_expiry;

    pub fn deserialize<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.filter(|s| !s.trim().is_empty())
            .map(|s| parse_expiry(&s).map_err(de::Error::custom))
            .transpose()
    }

    /// Only called when the field is present, so `null` becomes `Some(None)`.
    pub fn deserialize_patch<'de, D>(d: D) -> Result<Option<Option<NaiveDate>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize(d).map(Some)
    }
}

// Conversion implementations between REST DTOs and contract models

impl From<DiscountType> for DiscountTypeDto {
    fn from(kind: DiscountType) -> Self {
        match kind {
            DiscountType::Percentage => Self::Percentage,
            DiscountType::Fixed => Self::Fixed,
        }
    }
}

impl From<DiscountTypeDto> for DiscountType {
    fn from(kind: DiscountTypeDto) -> Self {
        match kind {
            DiscountTypeDto::Percentage => Self::Percentage,
            DiscountTypeDto::Fixed => Self::Fixed,
        }
    }
}

impl From<VoucherStatus> for VoucherStatusDto {
    fn from(s: VoucherStatus) -> Self {
        match s {
            VoucherStatus::Active => Self::Active,
            VoucherStatus::Expired => Self::Expired,
            VoucherStatus::Inactive => Self::Inactive,
        }
    }
}

impl VoucherDto {
    pub fn from_voucher(v: Voucher, today: NaiveDate) -> Self {
        let status = status::resolve(&v, today).into();
        Self {
            id: v.id,
            code: v.code,
            discount_amount: v.discount_amount,
            discount_type: v.discount_type.into(),
            expiry_date: v.expiry_date,
            is_active: v.is_active,
            status,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

impl From<Voucher> for VoucherDto {
    fn from(v: Voucher) -> Self {
        Self::from_voucher(v, status::today())
    }
}

impl From<VoucherDto> for Voucher {
    fn from(dto: VoucherDto) -> Self {
        Self {
            id: dto.id,
            code: dto.code,
            discount_amount: dto.discount_amount,
            discount_type: dto.discount_type.into(),
            expiry_date: dto.expiry_date,
            is_active: dto.is_active,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        }
    }
}

impl TryFrom<CreateVoucherReq> for NewVoucher {
    type Error = DomainError;

    /// Fails with the list of missing required fields.
    fn try_from(req: CreateVoucherReq) -> Result<Self, Self::Error> {
        match (req.code, req.discount_amount, req.discount_type) {
            (Some(code), Some(discount_amount), Some(kind)) => Ok(Self {
                code,
                discount_amount,
                discount_type: kind.into(),
                expiry_date: req.expiry_date,
                is_active: req.is_active.unwrap_or(true),
            }),
            (code, amount, kind) => {
                let missing: Vec<&str> = [
                    code.is_none().then_some("code"),
                    amount.is_none().then_some("discountAmount"),
                    kind.is_none().then_some("discountType"),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(DomainError::validation(
                    missing[0],
                    format!("incomplete data: missing {}", missing.join(", ")),
                ))
            }
        }
    }
}

impl From<NewVoucher> for CreateVoucherReq {
    fn from(v: NewVoucher) -> Self {
        Self {
            code: Some(v.code),
            discount_amount: Some(v.discount_amount),
            discount_type: Some(v.discount_type.into()),
            expiry_date: v.expiry_date,
            is_active: Some(v.is_active),
        }
    }
}

impl From<UpdateVoucherReq> for VoucherPatch {
    fn from(req: UpdateVoucherReq) -> Self {
        Self {
            code: req.code,
            discount_amount: req.discount_amount,
            discount_type: req.discount_type.map(Into::into),
            expiry_date: req.expiry_date,
            is_active: req.is_active,
        }
    }
}

impl From<VoucherPatch> for UpdateVoucherReq {
    fn from(p: VoucherPatch) -> Self {
        Self {
            code: p.code,
            discount_amount: p.discount_amount,
            discount_type: p.discount_type.map(Into::into),
            expiry_date: p.expiry_date,
            is_active: p.is_active,
        }
    }
}

impl From<BulkDeleteReport> for BulkDeleteReportDto {
    fn from(r: BulkDeleteReport) -> Self {
        Self {
            succeeded: r.succeeded,
            failed: r
                .failed
                .into_iter()
                .map(|f| BulkDeleteFailureDto {
                    id: f.id,
                    reason: f.reason,
                })
                .collect(),
        }
    }
}

impl From<BulkDeleteReportDto> for BulkDeleteReport {
    fn from(r: BulkDeleteReportDto) -> Self {
        Self {
            succeeded: r.succeeded,
            failed: r
                .failed
                .into_iter()
                .map(|f| BulkDeleteFailure {
                    id: f.id,
                    reason: f.reason,
                })
                .collect(),
        }
    }
}

impl TryFrom<ListVouchersQuery> for ListQuery {
    type Error = DomainError;

    fn try_from(q: ListVouchersQuery) -> Result<Self, Self::Error> {
        fn parse<T: std::str::FromStr<Err = String>>(
            field: &str,
            raw: Option<&str>,
        ) -> Result<Option<T>, DomainError> {
            raw.map(|s| s.parse::<T>())
                .transpose()
                .map_err(|msg| DomainError::validation(field, msg))
        }

        let key: Option<SortKey> = parse("sort", q.sort.as_deref())?;
        let direction: SortDirection = parse("order", q.order.as_deref())?.unwrap_or_default();
        Ok(Self {
            search: SearchTerm::new(q.search.unwrap_or_default()),
            status: parse("status", q.status.as_deref())?.unwrap_or_default(),
            discount_type: parse("type", q.discount_type.as_deref())?.unwrap_or_default(),
            sort: SortState { key, direction },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::{StatusFilter, TypeFilter};

    fn sample(today: NaiveDate) -> Voucher {
        Voucher {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            discount_amount: 10.0,
            discount_type: DiscountType::Percentage,
            expiry_date: today.pred_opt(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn dto_uses_camel_case_and_resolved_status() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let json = serde_json::to_value(VoucherDto::from_voucher(sample(today), today)).unwrap();
        assert_eq!(json["discountAmount"], 10.0);
        assert_eq!(json["discountType"], "percentage");
        assert_eq!(json["expiryDate"], "2025-05-01");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["status"], "expired");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn create_accepts_date_or_timestamp() {
        let req: CreateVoucherReq = serde_json::from_value(serde_json::json!({
            "code": "x", "discountAmount": 5, "discountType": "fixed",
            "expiryDate": "2030-01-31T23:59:00+07:00"
        }))
        .unwrap();
        assert_eq!(req.expiry_date, NaiveDate::from_ymd_opt(2030, 1, 31));

        let req: CreateVoucherReq = serde_json::from_value(serde_json::json!({
            "code": "x", "discountAmount": 5, "discountType": "fixed", "expiryDate": "2030-01-31"
        }))
        .unwrap();
        let new: NewVoucher = req.try_into().unwrap();
        assert_eq!(new.expiry_date, NaiveDate::from_ymd_opt(2030, 1, 31));
        assert!(new.is_active);

        let bad: Result<CreateVoucherReq, _> =
            serde_json::from_value(serde_json::json!({ "expiryDate": "31/01/2030" }));
        assert!(bad.is_err());
    }

    #[test]
    fn missing_required_fields_are_listed() {
        let req = CreateVoucherReq {
            code: Some("X".into()),
            ..Default::default()
        };
        let err = NewVoucher::try_from(req).unwrap_err();
        assert_eq!(
            err,
            DomainError::validation(
                "discountAmount",
                "incomplete data: missing discountAmount, discountType"
            )
        );
    }

    #[test]
    fn patch_distinguishes_absent_and_null_expiry() {
        let absent: UpdateVoucherReq =
            serde_json::from_value(serde_json::json!({ "isActive": false })).unwrap();
        assert_eq!(absent.expiry_date, None);

        let null: UpdateVoucherReq =
            serde_json::from_value(serde_json::json!({ "expiryDate": null })).unwrap();
        assert_eq!(null.expiry_date, Some(None));

        // Serializing back keeps the distinction
        assert_eq!(serde_json::to_value(&absent).unwrap(), serde_json::json!({ "isActive": false }));
        assert_eq!(serde_json::to_value(&null).unwrap(), serde_json::json!({ "expiryDate": null }));
    }

    #[test]
    fn list_query_parses_and_rejects() {
        let q = ListVouchersQuery {
            search: Some("save".into()),
            status: Some("active".into()),
            discount_type: Some("fixed".into()),
            sort: Some("discountAmount".into()),
            order: Some("desc".into()),
        };
        let parsed = ListQuery::try_from(q).unwrap();
        assert_eq!(parsed.search.as_str(), "save");
        assert_eq!(parsed.status, StatusFilter::Only(VoucherStatus::Active));
        assert_eq!(parsed.discount_type, TypeFilter::Only(DiscountType::Fixed));
        assert_eq!(
            parsed.sort,
            SortState::by(SortKey::DiscountAmount, SortDirection::Desc)
        );

        let bad = ListVouchersQuery {
            sort: Some("price".into()),
            ..Default::default()
        };
        assert_eq!(ListQuery::try_from(bad).unwrap_err().field(), Some("sort"));
    }
}
