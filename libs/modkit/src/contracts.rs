//! Capabilities a module can expose to the runtime.
//!
//! Phases run in this order for every module that has the capability:
//! `init` → `migrate` → `rest_prepare` / `register_rest` / `rest_finalize` → `start`,
//! and `stop` in reverse dependency order on shutdown.

use async_trait::async_trait;
use axum::Router;
use modkit_db::DbHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ModuleCtx;

pub use crate::api::OpenApiRegistry;

/// Every module has this. `init` wires clients and services; the schema may not exist yet.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Owns tables in the shared database.
#[async_trait]
pub trait DbModule: Send + Sync {
    async fn migrate(&self, db: &DbHandle) -> anyhow::Result<()>;
}

/// Contributes routes and their OpenAPI operations. Synchronous.
pub trait RestfulModule: Send + Sync {
    fn register_rest(
        &self,
        ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router>;
}

/// The single module that wraps every `RestfulModule` router. Serving happens in `start`.
pub trait RestHostModule: Send + Sync + 'static {
    /// Called before any module registers routes.
    fn rest_prepare(&self, ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router>;

    /// Called after all modules registered; the host keeps the result.
    fn rest_finalize(&self, ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router>;

    fn as_registry(&self) -> &dyn OpenApiRegistry;
}

/// Background work bounded by the runtime's cancellation token.
#[async_trait]
pub trait StatefulModule: Send + Sync {
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()>;
    async fn stop(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}
