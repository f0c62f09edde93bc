//! Voucher management: contract types, business rules, sea-orm storage, REST API,
//! local and HTTP gateways, and the dashboard list/form state.

use std::sync::Arc;

use modkit::registry::RegistryBuilder;

pub mod api;
pub mod config;
pub mod contract;
pub mod domain;
pub mod gateways;
pub mod infra;
mod module;
pub mod view;

pub use config::VouchersConfig;
pub use contract::{
    client::VouchersApi,
    error::VouchersError,
    model::{BulkDeleteReport, DiscountType, NewVoucher, Voucher, VoucherPatch, VoucherStatus},
};
pub use gateways::{http::VouchersHttpClient, local::VouchersLocalClient};
pub use module::{VouchersModule, MODULE_NAME};

/// Module entry point for `modkit::run`.
pub fn register(b: &mut RegistryBuilder) {
    let module = Arc::new(VouchersModule::default());
    b.register_core_with_meta(MODULE_NAME, &["api_ingress"], module.clone());
    b.register_db_with_meta(MODULE_NAME, module.clone());
    b.register_rest_with_meta(MODULE_NAME, module);
}
