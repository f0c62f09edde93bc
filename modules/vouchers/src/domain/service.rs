use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::contract::model::{
    BulkDeleteFailure, BulkDeleteReport, DiscountType, NewVoucher, Voucher, VoucherPatch,
};
use crate::domain::error::DomainError;
use crate::domain::listing::{self, ListQuery};
use crate::domain::repo::{CodeUniqueViolation, VouchersRepository};
use crate::domain::status;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_code_length: usize,
    pub max_bulk_delete: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_code_length: 32,
            max_bulk_delete: 500,
        }
    }
}

/// Business rules over the voucher repository.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn VouchersRepository>,
    config: ServiceConfig,
}

impl Service {
    pub fn new(repo: Arc<dyn VouchersRepository>, config: ServiceConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[instrument(name = "vouchers.service.list_vouchers", skip(self))]
    pub async fn list_vouchers(&self, query: &ListQuery) -> Result<Vec<Voucher>, DomainError> {
        let all = self.repo.list_newest_first().await.map_err(db_error)?;
        let rows = listing::apply(&all, query, status::today());
        debug!(total = all.len(), returned = rows.len(), "Listed vouchers");
        Ok(rows)
    }

    #[instrument(name = "vouchers.service.get_voucher", skip(self), fields(voucher_id = %id))]
    pub async fn get_voucher(&self, id: Uuid) -> Result<Voucher, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| DomainError::voucher_not_found(id))
    }

    #[instrument(name = "vouchers.service.create_voucher", skip(self, new_voucher))]
    pub async fn create_voucher(&self, new_voucher: NewVoucher) -> Result<Voucher, DomainError> {
        let code = normalize_code(&new_voucher.code);
        self.validate_code(&code)?;
        validate_amount(new_voucher.discount_amount, new_voucher.discount_type)?;
        if let Some(date) = new_voucher.expiry_date {
            validate_not_past(date, status::today())?;
        }

        if self.repo.code_exists(&code, None).await.map_err(db_error)? {
            return Err(DomainError::code_already_exists(code));
        }

        let now = Utc::now();
        let voucher = Voucher {
            id: Uuid::new_v4(),
            code,
            discount_amount: new_voucher.discount_amount,
            discount_type: new_voucher.discount_type,
            expiry_date: new_voucher.expiry_date,
            is_active: new_voucher.is_active,
            created_at: now,
            updated_at: now,
        };

        let code = voucher.code.clone();
        let created = self
            .repo
            .insert(voucher)
            .await
            .map_err(|e| write_error(e, &code))?;
        info!(voucher_id = %created.id, code = %created.code, "Created voucher");
        Ok(created)
    }

    /// Partial update; an expiry in the past is accepted here.
    #[instrument(name = "vouchers.service.update_voucher", skip(self, patch), fields(voucher_id = %id))]
    pub async fn update_voucher(&self, id: Uuid, patch: VoucherPatch) -> Result<Voucher, DomainError> {
        let current = self.get_voucher(id).await?;
        let code_changed = patch
            .code
            .as_deref()
            .map(normalize_code)
            .filter(|c| *c != current.code);

        let mut merged = current.clone();
        if let Some(code) = &code_changed {
            self.validate_code(code)?;
            merged.code = code.clone();
        }
        if let Some(amount) = patch.discount_amount {
            merged.discount_amount = amount;
        }
        if let Some(kind) = patch.discount_type {
            merged.discount_type = kind;
        }
        if let Some(expiry) = patch.expiry_date {
            merged.expiry_date = expiry;
        }
        if let Some(active) = patch.is_active {
            merged.is_active = active;
        }
        // Re-checked on the merged record: switching to percentage may break the bound
        validate_amount(merged.discount_amount, merged.discount_type)?;

        if let Some(code) = &code_changed {
            if self.repo.code_exists(code, Some(id)).await.map_err(db_error)? {
                return Err(DomainError::code_already_exists(code.clone()));
            }
        }

        if merged == current {
            debug!("Patch changes nothing");
            return Ok(current);
        }
        merged.updated_at = Utc::now();

        let code = merged.code.clone();
        let updated = self
            .repo
            .update(merged)
            .await
            .map_err(|e| write_error(e, &code))?;
        info!(code = %updated.code, "Updated voucher");
        Ok(updated)
    }

    #[instrument(name = "vouchers.service.delete_voucher", skip(self), fields(voucher_id = %id))]
    pub async fn delete_voucher(&self, id: Uuid) -> Result<(), DomainError> {
        if self.repo.delete(id).await.map_err(db_error)? {
            info!("Deleted voucher");
            Ok(())
        } else {
            Err(DomainError::voucher_not_found(id))
        }
    }

    /// One concurrent delete per distinct id; every outcome is reported.
    #[instrument(name = "vouchers.service.bulk_delete", skip(self, ids), fields(requested = ids.len()))]
    pub async fn bulk_delete(&self, ids: Vec<Uuid>) -> Result<BulkDeleteReport, DomainError> {
        if ids.is_empty() {
            return Err(DomainError::EmptySelection);
        }
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<Uuid> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        if ids.len() > self.config.max_bulk_delete {
            return Err(DomainError::TooManyIds {
                count: ids.len(),
                max: self.config.max_bulk_delete,
            });
        }

        let results = join_all(ids.iter().map(|id| self.repo.delete(*id))).await;

        let mut report = BulkDeleteReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(true) => report.succeeded.push(id),
                Ok(false) => report.failed.push(BulkDeleteFailure {
                    id,
                    reason: DomainError::voucher_not_found(id).to_string(),
                }),
                Err(e) => {
                    warn!(voucher_id = %id, error = %e, "Bulk delete item failed");
                    report.failed.push(BulkDeleteFailure {
                        id,
                        reason: "Internal error".to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk delete finished"
        );
        Ok(report)
    }

    fn validate_code(&self, code: &str) -> Result<(), DomainError> {
        if code.is_empty() {
            return Err(DomainError::EmptyCode);
        }
        let len = code.chars().count();
        if len > self.config.max_code_length {
            return Err(DomainError::CodeTooLong {
                len,
                max: self.config.max_code_length,
            });
        }
        Ok(())
    }
}

/// Trimmed, upper-cased code as stored.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate_amount(amount: f64, kind: DiscountType) -> Result<(), DomainError> {
    if !amount.is_finite() {
        return Err(DomainError::validation(
            "discountAmount",
            "must be a finite number",
        ));
    }
    if amount <= 0.0 {
        return Err(DomainError::NonPositiveAmount);
    }
    if kind == DiscountType::Percentage && amount > 100.0 {
        return Err(DomainError::PercentageOutOfRange { amount });
    }
    Ok(())
}

fn validate_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), DomainError> {
    if date < today {
        return Err(DomainError::ExpiryInPast { date });
    }
    Ok(())
}

fn db_error(e: anyhow::Error) -> DomainError {
    tracing::error!(error = %e, "Voucher storage failure");
    DomainError::database(e.to_string())
}

/// Insert/update failure: a lost uniqueness race is still a conflict.
fn write_error(e: anyhow::Error, code: &str) -> DomainError {
    if e.downcast_ref::<CodeUniqueViolation>().is_some() {
        return DomainError::code_already_exists(code);
    }
    db_error(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Repository double over a `Vec`, counting calls.
    #[derive(Default)]
    struct Store {
        rows: Mutex<Vec<Voucher>>,
        calls: AtomicUsize,
        /// Simulates a concurrent writer grabbing the code after `code_exists`.
        race_on_write: bool,
        fail_delete_for: Option<Uuid>,
    }

    impl Store {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl VouchersRepository for Store {
        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Voucher>> {
            self.hit();
            Ok(self.rows.lock().unwrap().iter().find(|v| v.id == id).cloned())
        }

        async fn code_exists(&self, code: &str, exclude_id: Option<Uuid>) -> anyhow::Result<bool> {
            self.hit();
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .any(|v| v.code == code && Some(v.id) != exclude_id))
        }

        async fn list_newest_first(&self) -> anyhow::Result<Vec<Voucher>> {
            self.hit();
            let mut rows = self.rows.lock().unwrap().clone();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        }

        async fn insert(&self, voucher: Voucher) -> anyhow::Result<Voucher> {
            self.hit();
            if self.race_on_write {
                return Err(CodeUniqueViolation.into());
            }
            self.rows.lock().unwrap().push(voucher.clone());
            Ok(voucher)
        }

        async fn update(&self, voucher: Voucher) -> anyhow::Result<Voucher> {
            self.hit();
            let mut rows = self.rows.lock().unwrap();
            let slot = rows
                .iter_mut()
                .find(|v| v.id == voucher.id)
                .ok_or_else(|| anyhow::anyhow!("missing row"))?;
            *slot = voucher.clone();
            Ok(voucher)
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            self.hit();
            if self.fail_delete_for == Some(id) {
                anyhow::bail!("disk I/O error");
            }
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|v| v.id != id);
            Ok(rows.len() < before)
        }
    }

    fn service_with(store: Arc<Store>) -> Service {
        Service::new(store, ServiceConfig::default())
    }

    fn new_voucher(code: &str, amount: f64, kind: DiscountType) -> NewVoucher {
        NewVoucher {
            code: code.to_string(),
            discount_amount: amount,
            discount_type: kind,
            expiry_date: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn create_normalizes_code() {
        let svc = service_with(Arc::new(Store::default()));
        let v = svc
            .create_voucher(new_voucher("  discount10 ", 10.0, DiscountType::Percentage))
            .await
            .unwrap();
        assert_eq!(v.code, "DISCOUNT10");
        assert_eq!(v.created_at, v.updated_at);
    }

    #[tokio::test]
    async fn duplicate_code_in_any_case_conflicts() {
        let svc = service_with(Arc::new(Store::default()));
        svc.create_voucher(new_voucher("discount10", 10.0, DiscountType::Fixed))
            .await
            .unwrap();
        let err = svc
            .create_voucher(new_voucher("Discount10", 5.0, DiscountType::Fixed))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::code_already_exists("DISCOUNT10"));
    }

    #[tokio::test]
    async fn storage_unique_violation_maps_to_conflict() {
        let store = Arc::new(Store {
            race_on_write: true,
            ..Default::default()
        });
        let err = service_with(store)
            .create_voucher(new_voucher("RACE", 1.0, DiscountType::Fixed))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::CodeAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn create_rejects_invalid_input_before_storage() {
        let store = Arc::new(Store::default());
        let svc = service_with(store.clone());

        let cases = [
            (new_voucher("   ", 10.0, DiscountType::Fixed), DomainError::EmptyCode),
            (
                new_voucher("A", 0.0, DiscountType::Fixed),
                DomainError::NonPositiveAmount,
            ),
            (
                new_voucher("A", -3.0, DiscountType::Fixed),
                DomainError::NonPositiveAmount,
            ),
            (
                new_voucher("A", 100.5, DiscountType::Percentage),
                DomainError::PercentageOutOfRange { amount: 100.5 },
            ),
            (
                new_voucher(&"X".repeat(33), 1.0, DiscountType::Fixed),
                DomainError::CodeTooLong { len: 33, max: 32 },
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(svc.create_voucher(input).await.unwrap_err(), expected);
        }

        let nan = svc
            .create_voucher(new_voucher("A", f64::NAN, DiscountType::Fixed))
            .await
            .unwrap_err();
        assert_eq!(nan.field(), Some("discountAmount"));

        let mut past = new_voucher("A", 1.0, DiscountType::Fixed);
        past.expiry_date = status::today().pred_opt();
        assert!(matches!(
            svc.create_voucher(past).await.unwrap_err(),
            DomainError::ExpiryInPast { .. }
        ));

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn percentage_of_exactly_100_and_large_fixed_are_valid() {
        let svc = service_with(Arc::new(Store::default()));
        svc.create_voucher(new_voucher("FULL", 100.0, DiscountType::Percentage))
            .await
            .unwrap();
        svc.create_voucher(new_voucher("BIG", 25_000.0, DiscountType::Fixed))
            .await
            .unwrap();

        let mut today = new_voucher("TODAY", 1.0, DiscountType::Fixed);
        today.expiry_date = Some(status::today());
        svc.create_voucher(today).await.unwrap();
    }

    #[tokio::test]
    async fn update_rechecks_percentage_on_merged_record() {
        let svc = service_with(Arc::new(Store::default()));
        let v = svc
            .create_voucher(new_voucher("FIX", 250.0, DiscountType::Fixed))
            .await
            .unwrap();

        let err = svc
            .update_voucher(
                v.id,
                VoucherPatch {
                    discount_type: Some(DiscountType::Percentage),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::PercentageOutOfRange { amount: 250.0 });
    }

    #[tokio::test]
    async fn update_allows_past_expiry_and_clearing_it() {
        let svc = service_with(Arc::new(Store::default()));
        let v = svc
            .create_voucher(new_voucher("OLD", 5.0, DiscountType::Fixed))
            .await
            .unwrap();

        let yesterday = status::today().pred_opt();
        let updated = svc
            .update_voucher(
                v.id,
                VoucherPatch {
                    expiry_date: Some(yesterday),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.expiry_date, yesterday);
        assert!(updated.updated_at >= v.updated_at);

        let cleared = svc
            .update_voucher(
                v.id,
                VoucherPatch {
                    expiry_date: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.expiry_date, None);
    }

    #[tokio::test]
    async fn update_code_conflicts_with_other_voucher_only() {
        let svc = service_with(Arc::new(Store::default()));
        let a = svc
            .create_voucher(new_voucher("AAA", 5.0, DiscountType::Fixed))
            .await
            .unwrap();
        svc.create_voucher(new_voucher("BBB", 5.0, DiscountType::Fixed))
            .await
            .unwrap();

        // Own code in another case is not a conflict
        let same = svc
            .update_voucher(
                a.id,
                VoucherPatch {
                    code: Some("aaa".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.code, "AAA");

        let err = svc
            .update_voucher(
                a.id,
                VoucherPatch {
                    code: Some("bbb".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::code_already_exists("BBB"));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let svc = service_with(Arc::new(Store::default()));
        let id = Uuid::new_v4();
        assert_eq!(
            svc.get_voucher(id).await.unwrap_err(),
            DomainError::voucher_not_found(id)
        );
        assert_eq!(
            svc.delete_voucher(id).await.unwrap_err(),
            DomainError::voucher_not_found(id)
        );
        assert_eq!(
            svc.update_voucher(id, VoucherPatch::default())
                .await
                .unwrap_err(),
            DomainError::voucher_not_found(id)
        );
    }

    #[tokio::test]
    async fn bulk_delete_empty_makes_no_storage_calls() {
        let store = Arc::new(Store::default());
        let err = service_with(store.clone())
            .bulk_delete(Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::EmptySelection);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn bulk_delete_reports_each_id() {
        let svc_store = Arc::new(Store::default());
        let svc = service_with(svc_store.clone());
        let a = svc
            .create_voucher(new_voucher("A1", 5.0, DiscountType::Fixed))
            .await
            .unwrap();
        let b = svc
            .create_voucher(new_voucher("B1", 5.0, DiscountType::Fixed))
            .await
            .unwrap();
        let ghost = Uuid::new_v4();

        let report = svc.bulk_delete(vec![a.id, ghost, b.id, a.id]).await.unwrap();
        assert_eq!(report.succeeded, vec![a.id, b.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, ghost);
        assert!(svc_store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_delete_partial_storage_failure() {
        let doomed = Uuid::new_v4();
        let store = Arc::new(Store {
            fail_delete_for: Some(doomed),
            ..Default::default()
        });
        let svc = service_with(store);
        let ok = svc
            .create_voucher(new_voucher("OK", 5.0, DiscountType::Fixed))
            .await
            .unwrap();

        let report = svc.bulk_delete(vec![ok.id, doomed]).await.unwrap();
        assert_eq!(report.succeeded, vec![ok.id]);
        assert_eq!(report.failed[0].id, doomed);
        assert_eq!(report.failed[0].reason, "Internal error");
        assert!(!report.is_complete_success());
    }

    #[tokio::test]
    async fn bulk_delete_limit() {
        let svc = Service::new(
            Arc::new(Store::default()),
            ServiceConfig {
                max_bulk_delete: 2,
                ..Default::default()
            },
        );
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        assert_eq!(
            svc.bulk_delete(ids).await.unwrap_err(),
            DomainError::TooManyIds { count: 3, max: 2 }
        );
    }
}
