use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::error::VouchersError;
use crate::contract::model::{BulkDeleteReport, NewVoucher, Voucher, VoucherPatch};

/// Voucher CRUD gateway. Implemented in-process by `VouchersLocalClient` and over
/// REST by `VouchersHttpClient`.
#[async_trait]
pub trait VouchersApi: Send + Sync {
    /// All vouchers, newest first.
    async fn list_vouchers(&self) -> Result<Vec<Voucher>, VouchersError>;

    async fn get_voucher(&self, id: Uuid) -> Result<Voucher, VouchersError>;

    async fn create_voucher(&self, new_voucher: NewVoucher) -> Result<Voucher, VouchersError>;

    async fn update_voucher(&self, id: Uuid, patch: VoucherPatch)
        -> Result<Voucher, VouchersError>;

    /// Deleting a missing id is `NotFound`, not a no-op.
    async fn delete_voucher(&self, id: Uuid) -> Result<(), VouchersError>;

    async fn bulk_delete_vouchers(&self, ids: Vec<Uuid>)
        -> Result<BulkDeleteReport, VouchersError>;
}
