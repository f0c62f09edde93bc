//! REST host: owns the HTTP server and the global middleware stack, and collects typed
//! operation specs from every REST module into a single OpenAPI document.

use async_trait::async_trait;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use anyhow::{Context, Result};
use axum::http::Method;
use axum::{middleware::from_fn, routing::get, Router};
use modkit::api::{OpenApiRegistry, OperationSpec, ParamLocation};
use modkit::registry::RegistryBuilder;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};
use utoipa::openapi::{schema::Schema, RefOr};

mod config;
mod model;
mod openapi;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;
pub use request_id::XRequestId;

use model::{ComponentsRegistry, SchemaInsert};

pub const MODULE_NAME: &str = "api_ingress";

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Module entry point for `modkit::run`.
pub fn register(b: &mut RegistryBuilder) {
    let module = Arc::new(ApiIngress::default());
    b.register_core_with_meta(MODULE_NAME, &[], module.clone());
    b.register_rest_host_with_meta(MODULE_NAME, module.clone());
    b.register_stateful_with_meta(MODULE_NAME, module);
}

pub struct ApiIngress {
    config: ArcSwap<ApiIngressConfig>,
    components_registry: ArcSwap<ComponentsRegistry>,
    // Router produced by the REST phase, taken by `start`
    final_router: Mutex<Option<Router>>,
    server: Mutex<Option<JoinHandle<Result<()>>>>,
    bound_addr: Mutex<Option<SocketAddr>>,

    // Duplicate detection (per (method, path) and per handler id)
    registered_routes: DashMap<(Method, String), ()>,
    registered_handlers: DashMap<String, ()>,

    operation_specs: DashMap<String, OperationSpec>,
}

impl Default for ApiIngress {
    fn default() -> Self {
        Self::new(ApiIngressConfig::default())
    }
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            components_registry: ArcSwap::from_pointee(ComponentsRegistry::default()),
            final_router: Mutex::new(None),
            server: Mutex::new(None),
            bound_addr: Mutex::new(None),
            registered_routes: DashMap::new(),
            registered_handlers: DashMap::new(),
            operation_specs: DashMap::new(),
        }
    }

    pub fn get_config(&self) -> ApiIngressConfig {
        (**self.config.load()).clone()
    }

    /// Address the listener actually bound (resolves port `0`).
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock()
    }

    pub fn operation_count(&self) -> usize {
        self.operation_specs.len()
    }

    /// Wrap `router` in the global middleware stack.
    ///
    /// Outermost to innermost:
    /// SetRequestId -> PropagateRequestId -> Trace -> push_req_id_to_extensions -> Timeout -> BodyLimit -> CORS
    fn apply_middleware(&self, mut router: Router) -> Router {
        let config = self.get_config();
        let x_request_id = request_id::header();

        if config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        router = router
            .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            )))
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(request_id::create_trace_layer())
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId));
        router
    }

    fn make_schema(
        components: &ComponentsRegistry,
        content_type: &str,
        schema_name: Option<&str>,
        array: bool,
    ) -> serde_json::Value {
        let item = match schema_name {
            Some(name) if components.has_schema(name) => {
                serde_json::json!({ "$ref": format!("#/components/schemas/{name}") })
            }
            _ => match content_type {
                "application/json" if !array => serde_json::json!({ "type": "object" }),
                "application/json" => serde_json::json!({}),
                "text/plain" | "text/html" => serde_json::json!({ "type": "string" }),
                _ => serde_json::json!({}),
            },
        };
        if array {
            serde_json::json!({ "type": "array", "items": item })
        } else {
            item
        }
    }

    fn make_content_obj(
        components: &ComponentsRegistry,
        content_type: &str,
        schema_name: Option<&str>,
        array: bool,
    ) -> serde_json::Value {
        let schema = Self::make_schema(components, content_type, schema_name, array);
        serde_json::json!({ content_type: { "schema": schema } })
    }

    fn operation_json(components: &ComponentsRegistry, spec: &OperationSpec) -> serde_json::Value {
        let mut operation = serde_json::Map::new();

        let op_id = spec
            .operation_id
            .clone()
            .unwrap_or_else(|| spec.handler_id.clone());
        operation.insert("operationId".into(), op_id.into());
        if let Some(summary) = &spec.summary {
            operation.insert("summary".into(), summary.clone().into());
        }
        if let Some(description) = &spec.description {
            operation.insert("description".into(), description.clone().into());
        }
        if !spec.tags.is_empty() {
            operation.insert("tags".into(), spec.tags.clone().into());
        }

        if let Some(req) = &spec.request_body {
            let mut rb = serde_json::Map::new();
            if let Some(desc) = &req.description {
                rb.insert("description".into(), desc.clone().into());
            }
            rb.insert("required".into(), req.required.into());
            rb.insert(
                "content".into(),
                Self::make_content_obj(
                    components,
                    req.content_type,
                    req.schema_name.as_deref(),
                    false,
                ),
            );
            operation.insert("requestBody".into(), rb.into());
        }

        let mut responses = serde_json::Map::new();
        for r in &spec.responses {
            let mut obj = serde_json::Map::new();
            obj.insert("description".into(), r.description.clone().into());
            // 204 carries no body
            if r.status != 204 {
                obj.insert(
                    "content".into(),
                    Self::make_content_obj(
                        components,
                        r.content_type,
                        r.schema_name.as_deref(),
                        r.array,
                    ),
                );
            }
            responses.insert(r.status.to_string(), obj.into());
        }
        operation.insert("responses".into(), responses.into());

        if !spec.params.is_empty() {
            let parameters: Vec<serde_json::Value> = spec
                .params
                .iter()
                .map(|p| {
                    let location = match p.location {
                        ParamLocation::Path => "path",
                        ParamLocation::Query => "query",
                    };
                    // OpenAPI requires all path params to be required.
                    let required = p.location == ParamLocation::Path || p.required;
                    let mut param = serde_json::json!({
                        "name": p.name,
                        "in": location,
                        "required": required,
                        "schema": { "type": p.param_type },
                    });
                    if let (Some(desc), Some(obj)) = (&p.description, param.as_object_mut()) {
                        obj.insert("description".into(), desc.clone().into());
                    }
                    param
                })
                .collect();
            operation.insert("parameters".into(), parameters.into());
        }

        operation.into()
    }

    /// Build the OpenAPI document from registered operations and components.
    pub fn build_openapi(&self) -> Result<openapi::Document> {
        let components = self.components_registry.load();
        tracing::info!(
            operations = self.operation_specs.len(),
            "Building OpenAPI document"
        );

        let mut doc = openapi::DocumentBuilder::default();
        for entry in self.operation_specs.iter() {
            let spec = entry.value();
            doc.operation(
                &spec.path,
                spec.method.as_str(),
                &spec.tags,
                Self::operation_json(&components, spec),
            );
        }
        for (name, schema) in &components.schemas {
            doc.schema(name, serde_json::to_value(schema)?);
        }
        Ok(doc.finish())
    }

    async fn serve(
        listener: tokio::net::TcpListener,
        router: Router,
        cancel: CancellationToken,
    ) -> Result<()> {
        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}

#[async_trait]
impl modkit::Module for ApiIngress {
    async fn init(&self, ctx: &modkit::ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<ApiIngressConfig>();
        tracing::debug!(
            module = MODULE_NAME,
            bind_addr = %cfg.bind_addr,
            enable_docs = cfg.enable_docs,
            "Module initialized"
        );
        self.config.store(Arc::new(cfg));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl modkit::contracts::RestHostModule for ApiIngress {
    fn rest_prepare(&self, _ctx: &modkit::ModuleCtx, router: Router) -> Result<Router> {
        let router = router
            .route("/health", get(web::health_check))
            .route("/healthz", get(|| async { "ok" }));
        tracing::debug!("REST host prepared base router with health checks");
        Ok(router)
    }

    fn rest_finalize(&self, _ctx: &modkit::ModuleCtx, mut router: Router) -> Result<Router> {
        if self.get_config().enable_docs {
            // Built once, served as static JSON
            let openapi_value = Arc::new(serde_json::to_value(self.build_openapi()?)?);

            router = router
                .route(
                    "/openapi.json",
                    get({
                        use axum::{http::header, response::IntoResponse};
                        let v = openapi_value.clone();
                        move || async move {
                            let json = axum::Json((*v).clone());
                            ([(header::CACHE_CONTROL, "no-store")], json).into_response()
                        }
                    }),
                )
                .route("/docs", get(web::serve_docs));
        }

        let router = self.apply_middleware(router);
        *self.final_router.lock() = Some(router.clone());

        tracing::debug!("REST host finalized router");
        Ok(router)
    }

    fn as_registry(&self) -> &dyn OpenApiRegistry {
        self
    }
}

#[async_trait]
impl modkit::contracts::StatefulModule for ApiIngress {
    async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let cfg = self.get_config();
        let addr: SocketAddr = cfg
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address '{}'", cfg.bind_addr))?;

        // Take the router so the guard is dropped before awaiting
        let stored = { self.final_router.lock().take() };
        let router = match stored {
            Some(r) => r,
            None => {
                tracing::warn!("No router from REST phase; serving health checks only");
                self.apply_middleware(Router::new().route("/health", get(web::health_check)))
            }
        };

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local = listener.local_addr()?;
        *self.bound_addr.lock() = Some(local);
        tracing::info!(addr = %local, "HTTP server bound");

        let handle = tokio::spawn(Self::serve(listener, router, cancel));
        *self.server.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self, cancel: CancellationToken) -> Result<()> {
        cancel.cancel();
        let handle = { self.server.lock().take() };
        let Some(handle) = handle else {
            return Ok(());
        };
        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(res)) => res,
            Ok(Err(join_err)) => Err(anyhow::anyhow!("HTTP server task failed: {join_err}")),
            Err(_) => {
                tracing::warn!("HTTP server did not stop within {:?}", STOP_TIMEOUT);
                Ok(())
            }
        }
    }
}

impl OpenApiRegistry for ApiIngress {
    fn register_operation(&self, spec: &OperationSpec) {
        // First registration wins; a second one is a programming error.
        if self
            .registered_handlers
            .insert(spec.handler_id.clone(), ())
            .is_some()
        {
            tracing::error!(
                handler_id = %spec.handler_id,
                method = %spec.method.as_str(),
                path = %spec.path,
                "Duplicate handler_id detected; ignoring subsequent registration"
            );
            return;
        }

        let route_key = (spec.method.clone(), spec.path.clone());
        if self.registered_routes.insert(route_key, ()).is_some() {
            tracing::error!(
                method = %spec.method.as_str(),
                path = %spec.path,
                "Duplicate (method, path) detected; ignoring subsequent registration"
            );
            return;
        }

        let operation_key = format!("{}:{}", spec.method.as_str(), spec.path);
        self.operation_specs.insert(operation_key, spec.clone());

        tracing::debug!(
            handler_id = %spec.handler_id,
            method = %spec.method.as_str(),
            path = %spec.path,
            total_operations = self.operation_specs.len(),
            "Registered API operation"
        );
    }

    fn ensure_schema_raw(&self, name: &str, schemas: Vec<(String, RefOr<Schema>)>) -> String {
        // Copy-on-write snapshot
        let current = self.components_registry.load();
        let mut reg = (**current).clone();

        for (key, schema) in schemas {
            match reg.register_schema(&key, schema) {
                SchemaInsert::Inserted => {
                    tracing::debug!(root = %name, key = %key, "Registered schema");
                }
                SchemaInsert::Identical => {}
                SchemaInsert::Conflict => {
                    tracing::error!(
                        root = %name,
                        key = %key,
                        "Conflicting schema content under the same component key; keeping the first"
                    );
                }
            }
        }

        self.components_registry.store(Arc::new(reg));
        name.to_string()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
