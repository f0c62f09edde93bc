use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::model::Voucher;

/// Storage rejected a write because `code` is already taken.
///
/// Repositories return it inside `anyhow::Error` so the service can tell a lost
/// uniqueness race apart from other storage failures.
#[derive(Debug, thiserror::Error)]
#[error("unique constraint violated on voucher code")]
pub struct CodeUniqueViolation;

/// Persistence port of the vouchers domain.
#[async_trait]
pub trait VouchersRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Voucher>>;

    /// Whether `code` is used by any voucher other than `exclude_id`.
    async fn code_exists(&self, code: &str, exclude_id: Option<Uuid>) -> anyhow::Result<bool>;

    async fn list_newest_first(&self) -> anyhow::Result<Vec<Voucher>>;

    async fn insert(&self, voucher: Voucher) -> anyhow::Result<Voucher>;

    /// Overwrite every stored field of `voucher.id`.
    async fn update(&self, voucher: Voucher) -> anyhow::Result<Voucher>;

    /// Returns `false` when no row had that id.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}
