use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::contract::{
    client::VouchersApi,
    error::VouchersError,
    model::{BulkDeleteReport, NewVoucher, Voucher, VoucherPatch},
};
use crate::domain::listing::ListQuery;
use crate::domain::{error::DomainError, service::Service};

/// In-process `VouchersApi` that delegates to the domain service
pub struct VouchersLocalClient {
    service: Arc<Service>,
}

impl VouchersLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl VouchersApi for VouchersLocalClient {
    async fn list_vouchers(&self) -> Result<Vec<Voucher>, VouchersError> {
        self.service
            .list_vouchers(&ListQuery::default())
            .await
            .map_err(map_domain_error)
    }

    async fn get_voucher(&self, id: Uuid) -> Result<Voucher, VouchersError> {
        self.service.get_voucher(id).await.map_err(map_domain_error)
    }

    async fn create_voucher(&self, new_voucher: NewVoucher) -> Result<Voucher, VouchersError> {
        self.service
            .create_voucher(new_voucher)
            .await
            .map_err(map_domain_error)
    }

    async fn update_voucher(
        &self,
        id: Uuid,
        patch: VoucherPatch,
    ) -> Result<Voucher, VouchersError> {
        self.service
            .update_voucher(id, patch)
            .await
            .map_err(map_domain_error)
    }

    async fn delete_voucher(&self, id: Uuid) -> Result<(), VouchersError> {
        self.service
            .delete_voucher(id)
            .await
            .map_err(map_domain_error)
    }

    async fn bulk_delete_vouchers(
        &self,
        ids: Vec<Uuid>,
    ) -> Result<BulkDeleteReport, VouchersError> {
        self.service.bulk_delete(ids).await.map_err(map_domain_error)
    }
}

/// Map domain errors to the contract taxonomy
pub(crate) fn map_domain_error(domain_error: DomainError) -> VouchersError {
    match domain_error {
        DomainError::VoucherNotFound { id } => VouchersError::not_found(id),
        DomainError::CodeAlreadyExists { code } => VouchersError::code_conflict(code),
        DomainError::Database { .. } => VouchersError::internal(),
        other => VouchersError::validation(other.to_string()),
    }
}
