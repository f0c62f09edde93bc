use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use modkit::api::OpenApiRegistry;
use modkit::{DbModule, Module, ModuleCtx, RestfulModule};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::api::rest::routes;
use crate::config::VouchersConfig;
use crate::contract::client::VouchersApi;
use crate::domain::service::Service;
use crate::gateways::local::VouchersLocalClient;
use crate::infra::storage::{migrations::Migrator, SeaOrmVouchersRepository};

pub const MODULE_NAME: &str = "vouchers";

/// Voucher feature module: storage migrations, REST routes and the in-process client.
#[derive(Default)]
pub struct VouchersModule {
    service: ArcSwapOption<Service>,
}

impl VouchersModule {
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.load_full()
    }

    fn require_service(&self) -> Result<Arc<Service>> {
        self.service()
            .context("vouchers service is not initialized; init phase must run first")
    }
}

#[async_trait]
impl Module for VouchersModule {
    async fn init(&self, ctx: &ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<VouchersConfig>();
        let db = ctx.db_required().context("vouchers module needs a database")?;

        let repo = Arc::new(SeaOrmVouchersRepository::new(db.sea()));
        let service = Arc::new(Service::new(repo, (&cfg).into()));
        self.service.store(Some(service.clone()));

        let api: Arc<dyn VouchersApi> = Arc::new(VouchersLocalClient::new(service));
        ctx.client_hub().register::<dyn VouchersApi>(api);

        debug!(
            module = MODULE_NAME,
            max_code_length = cfg.max_code_length,
            max_bulk_delete = cfg.max_bulk_delete,
            "Module initialized"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl DbModule for VouchersModule {
    async fn migrate(&self, db: &modkit_db::DbHandle) -> Result<()> {
        Migrator::up(db.seaorm(), None)
            .await
            .context("vouchers migrations failed")?;
        info!(module = MODULE_NAME, "Migrations applied");
        Ok(())
    }
}

impl RestfulModule for VouchersModule {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> Result<Router> {
        let router = routes::register_routes(router, openapi, self.require_service()?)?;
        info!(module = MODULE_NAME, "REST routes registered");
        Ok(router)
    }
}
