use axum::Router;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::context;
use crate::contracts;

/// A module crate's entry point: fills the builder with its core and capabilities.
pub type Registrator = fn(&mut RegistryBuilder);

pub struct ModuleEntry {
    pub name: &'static str,
    pub deps: &'static [&'static str],
    pub core: Arc<dyn contracts::Module>,
    pub rest: Option<Arc<dyn contracts::RestfulModule>>,
    pub rest_host: Option<Arc<dyn contracts::RestHostModule>>,
    pub db: Option<Arc<dyn contracts::DbModule>>,
    pub stateful: Option<Arc<dyn contracts::StatefulModule>>,
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_rest", &self.rest.is_some())
            .field("is_rest_host", &self.rest_host.is_some())
            .field("has_db", &self.db.is_some())
            .field("has_stateful", &self.stateful.is_some())
            .finish()
    }
}

/// Modules in dependency order.
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.modules.iter().map(|m| m.name).collect();
        f.debug_struct("ModuleRegistry").field("modules", &names).finish()
    }
}

impl ModuleRegistry {
    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub fn from_registrators(registrators: &[Registrator]) -> Result<Self, RegistryError> {
        let mut b = RegistryBuilder::default();
        for r in registrators {
            r(&mut b);
        }
        b.build_topo_sorted()
    }

    pub async fn run_init_phase(&self, base_ctx: &context::ModuleCtx) -> Result<(), RegistryError> {
        for e in &self.modules {
            let ctx = base_ctx.clone().for_module(e.name);
            e.core.init(&ctx).await.map_err(failed(Phase::Init, e.name))?;
        }
        Ok(())
    }

    pub async fn run_db_phase(&self, db: &modkit_db::DbHandle) -> Result<(), RegistryError> {
        for (name, m) in self.modules.iter().filter_map(|e| Some((e.name, e.db.as_ref()?))) {
            tracing::debug!(module = name, "Running migrations");
            m.migrate(db).await.map_err(failed(Phase::Migrate, name))?;
        }
        Ok(())
    }

    /// Host prepare, then every REST provider in order, then host finalize.
    pub fn run_rest_phase(
        &self,
        base_ctx: &context::ModuleCtx,
        router: Router,
    ) -> Result<Router, RegistryError> {
        let host = self
            .modules
            .iter()
            .find_map(|e| Some((e.name, e.rest_host.as_ref()?)));
        let Some((host_name, host)) = host else {
            if self.modules.iter().any(|e| e.rest.is_some()) {
                return Err(RegistryError::RestRequiresHost);
            }
            return Ok(router);
        };
        let host_ctx = base_ctx.clone().for_module(host_name);
        let openapi = host.as_registry();

        let mut router = host
            .rest_prepare(&host_ctx, router)
            .map_err(failed(Phase::RestPrepare, host_name))?;
        for (name, m) in self.modules.iter().filter_map(|e| Some((e.name, e.rest.as_ref()?))) {
            let ctx = base_ctx.clone().for_module(name);
            router = m
                .register_rest(&ctx, router, openapi)
                .map_err(failed(Phase::RestRegister, name))?;
        }
        host.rest_finalize(&host_ctx, router)
            .map_err(failed(Phase::RestFinalize, host_name))
    }

    pub async fn run_start_phase(&self, cancel: CancellationToken) -> Result<(), RegistryError> {
        for (name, m) in self.stateful() {
            m.start(cancel.clone())
                .await
                .map_err(failed(Phase::Start, name))?;
        }
        Ok(())
    }

    /// Reverse order; a failing module is logged and the rest still stop.
    pub async fn run_stop_phase(&self, cancel: CancellationToken) {
        let stateful: Vec<_> = self.stateful().collect();
        for (name, m) in stateful.into_iter().rev() {
            if let Err(err) = m.stop(cancel.clone()).await {
                tracing::warn!(module = name, error = %err, "Failed to stop module");
            }
        }
    }

    fn stateful(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn contracts::StatefulModule>)> {
        self.modules
            .iter()
            .filter_map(|e| Some((e.name, e.stateful.as_ref()?)))
    }
}

/// Collects registrations; names must be unique, checked at build time.
#[derive(Default)]
pub struct RegistryBuilder {
    core: BTreeMap<&'static str, (Arc<dyn contracts::Module>, &'static [&'static str])>,
    rest: BTreeMap<&'static str, Arc<dyn contracts::RestfulModule>>,
    rest_host: Option<(&'static str, Arc<dyn contracts::RestHostModule>)>,
    db: BTreeMap<&'static str, Arc<dyn contracts::DbModule>>,
    stateful: BTreeMap<&'static str, Arc<dyn contracts::StatefulModule>>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    pub fn register_core_with_meta(
        &mut self,
        name: &'static str,
        deps: &'static [&'static str],
        m: Arc<dyn contracts::Module>,
    ) {
        if self.core.contains_key(name) {
            self.errors.push(format!("Module '{name}' is already registered"));
            return;
        }
        self.core.insert(name, (m, deps));
    }

    pub fn register_rest_with_meta(
        &mut self,
        name: &'static str,
        m: Arc<dyn contracts::RestfulModule>,
    ) {
        self.rest.insert(name, m);
    }

    pub fn register_rest_host_with_meta(
        &mut self,
        name: &'static str,
        m: Arc<dyn contracts::RestHostModule>,
    ) {
        if let Some((existing, _)) = &self.rest_host {
            self.errors.push(format!(
                "Multiple REST host modules detected: '{existing}' and '{name}'"
            ));
            return;
        }
        self.rest_host = Some((name, m));
    }

    pub fn register_db_with_meta(&mut self, name: &'static str, m: Arc<dyn contracts::DbModule>) {
        self.db.insert(name, m);
    }

    pub fn register_stateful_with_meta(
        &mut self,
        name: &'static str,
        m: Arc<dyn contracts::StatefulModule>,
    ) {
        self.stateful.insert(name, m);
    }

    fn check_capabilities(&self) -> Result<(), RegistryError> {
        let capability_names = self
            .rest
            .keys()
            .chain(self.db.keys())
            .chain(self.stateful.keys())
            .chain(self.rest_host.iter().map(|(n, _)| n));
        for n in capability_names {
            if !self.core.contains_key(n) {
                return Err(RegistryError::UnknownModule((*n).to_string()));
            }
        }
        for (name, (_, deps)) in &self.core {
            if let Some(missing) = deps.iter().find(|d| !self.core.contains_key(*d)) {
                return Err(RegistryError::UnknownDependency {
                    module: (*name).to_string(),
                    depends_on: (*missing).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Depth-first topological order: dependencies first, ties broken by name.
    fn topo_order(&self) -> Result<Vec<&'static str>, RegistryError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            name: &'static str,
            core: &BTreeMap<&'static str, (Arc<dyn contracts::Module>, &'static [&'static str])>,
            marks: &mut BTreeMap<&'static str, Mark>,
            stack: &mut Vec<&'static str>,
            order: &mut Vec<&'static str>,
        ) -> Result<(), RegistryError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut path = stack[start..].to_vec();
                    path.push(name);
                    return Err(RegistryError::CycleDetected { path });
                }
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            stack.push(name);
            if let Some((_, deps)) = core.get(name) {
                for dep in deps.iter() {
                    visit(*dep, core, marks, stack, order)?;
                }
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            order.push(name);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let mut order = Vec::with_capacity(self.core.len());
        for name in self.core.keys() {
            visit(*name, &self.core, &mut marks, &mut Vec::new(), &mut order)?;
        }
        Ok(order)
    }

    pub fn build_topo_sorted(self) -> Result<ModuleRegistry, RegistryError> {
        if !self.errors.is_empty() {
            return Err(RegistryError::InvalidRegistryConfiguration {
                errors: self.errors,
            });
        }
        self.check_capabilities()?;
        let order = self.topo_order()?;

        let mut modules = Vec::with_capacity(order.len());
        for name in order {
            let Some((core, deps)) = self.core.get(name) else {
                return Err(RegistryError::UnknownModule(name.to_string()));
            };
            modules.push(ModuleEntry {
                name,
                deps,
                core: core.clone(),
                rest: self.rest.get(name).cloned(),
                rest_host: self
                    .rest_host
                    .as_ref()
                    .filter(|(host, _)| *host == name)
                    .map(|(_, m)| m.clone()),
                db: self.db.get(name).cloned(),
                stateful: self.stateful.get(name).cloned(),
            });
        }

        tracing::info!(
            modules = ?modules.iter().map(|e| e.name).collect::<Vec<_>>(),
            "Module dependency order resolved"
        );

        Ok(ModuleRegistry { modules })
    }
}

/// Lifecycle step a module failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Migrate,
    RestPrepare,
    RestRegister,
    RestFinalize,
    Start,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Init => "initialization",
            Phase::Migrate => "DB migration",
            Phase::RestPrepare => "REST prepare",
            Phase::RestRegister => "REST registration",
            Phase::RestFinalize => "REST finalize",
            Phase::Start => "start",
        })
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{phase} failed for module '{module}'")]
    Phase {
        phase: Phase,
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST phase requires an ingress host module, but none was registered")]
    RestRequiresHost,
    #[error("unknown module '{0}'")]
    UnknownModule(String),
    #[error("module '{module}' depends on unknown '{depends_on}'")]
    UnknownDependency { module: String, depends_on: String },
    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<&'static str> },
    #[error("invalid registry configuration:\n{}", errors.join("\n"))]
    InvalidRegistryConfiguration { errors: Vec<String> },
}

fn failed(phase: Phase, module: &'static str) -> impl FnOnce(anyhow::Error) -> RegistryError {
    move |source| RegistryError::Phase {
        phase,
        module,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::operation_builder::{OpenApiRegistry, OperationSpec};
    use crate::context::{ModuleCtx, ModuleCtxBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use utoipa::openapi::{RefOr, Schema};

    #[derive(Default)]
    struct DummyCore;

    #[async_trait::async_trait]
    impl contracts::Module for DummyCore {
        async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct DummyRest;

    impl contracts::RestfulModule for DummyRest {
        fn register_rest(
            &self,
            _ctx: &ModuleCtx,
            router: Router,
            registry: &dyn OpenApiRegistry,
        ) -> anyhow::Result<Router> {
            registry.ensure_schema_raw("Dummy", vec![]);
            Ok(router.route("/dummy", axum::routing::get(|| async { "ok" })))
        }
    }

    #[derive(Default)]
    struct DummyHost {
        schemas: AtomicUsize,
        finalized: AtomicUsize,
    }

    impl OpenApiRegistry for DummyHost {
        fn register_operation(&self, _spec: &OperationSpec) {}
        fn ensure_schema_raw(&self, name: &str, _schemas: Vec<(String, RefOr<Schema>)>) -> String {
            self.schemas.fetch_add(1, Ordering::SeqCst);
            name.to_string()
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    impl contracts::RestHostModule for DummyHost {
        fn rest_prepare(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
            Ok(router)
        }
        fn rest_finalize(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
            self.finalized.fetch_add(1, Ordering::SeqCst);
            Ok(router)
        }
        fn as_registry(&self) -> &dyn OpenApiRegistry {
            self
        }
    }

    fn names(reg: &ModuleRegistry) -> Vec<&'static str> {
        reg.modules().iter().map(|m| m.name).collect()
    }

    #[test]
    fn topo_sort_puts_dependencies_first() {
        let mut b = RegistryBuilder::default();
        b.register_core_with_meta("vouchers", &["api_ingress"], Arc::new(DummyCore));
        b.register_core_with_meta("api_ingress", &[], Arc::new(DummyCore));
        b.register_core_with_meta("audit", &["vouchers"], Arc::new(DummyCore));

        let reg = b.build_topo_sorted().unwrap();
        assert_eq!(names(&reg), vec!["api_ingress", "vouchers", "audit"]);
    }

    #[test]
    fn unknown_dependency_error() {
        let mut b = RegistryBuilder::default();
        b.register_core_with_meta("core_a", &["missing_dep"], Arc::new(DummyCore));

        match b.build_topo_sorted().unwrap_err() {
            RegistryError::UnknownDependency { module, depends_on } => {
                assert_eq!(module, "core_a");
                assert_eq!(depends_on, "missing_dep");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let mut b = RegistryBuilder::default();
        b.register_core_with_meta("a", &["b"], Arc::new(DummyCore));
        b.register_core_with_meta("b", &["c"], Arc::new(DummyCore));
        b.register_core_with_meta("c", &["a"], Arc::new(DummyCore));
        b.register_core_with_meta("d", &[], Arc::new(DummyCore));

        let err = b.build_topo_sorted().unwrap_err();
        let msg = err.to_string();
        match err {
            RegistryError::CycleDetected { path } => {
                assert_eq!(path, vec!["a", "b", "c", "a"]);
                assert!(msg.contains("a -> b -> c -> a"));
            }
            other => panic!("expected CycleDetected, got: {other:?}"),
        }
    }

    #[test]
    fn duplicate_core_and_second_host_are_configuration_errors() {
        let mut b = RegistryBuilder::default();
        b.register_core_with_meta("a", &[], Arc::new(DummyCore));
        b.register_core_with_meta("a", &[], Arc::new(DummyCore));
        b.register_rest_host_with_meta("a", Arc::new(DummyHost::default()));
        b.register_rest_host_with_meta("b", Arc::new(DummyHost::default()));

        match b.build_topo_sorted().unwrap_err() {
            RegistryError::InvalidRegistryConfiguration { errors } => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("already registered"));
                assert!(errors[1].contains("Multiple REST host"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn capability_without_core_is_rejected() {
        let mut b = RegistryBuilder::default();
        b.register_rest_with_meta("ghost", Arc::new(DummyRest));
        assert!(matches!(
            b.build_topo_sorted().unwrap_err(),
            RegistryError::UnknownModule(n) if n == "ghost"
        ));
    }

    #[test]
    fn rest_requires_host_if_rest_modules_exist() {
        let mut b = RegistryBuilder::default();
        b.register_core_with_meta("svc", &[], Arc::new(DummyCore));
        b.register_rest_with_meta("svc", Arc::new(DummyRest));
        let reg = b.build_topo_sorted().unwrap();

        let base_ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();
        let err = reg.run_rest_phase(&base_ctx, Router::new()).unwrap_err();
        assert!(matches!(err, RegistryError::RestRequiresHost));
    }

    #[test]
    fn rest_phase_runs_providers_through_the_host() {
        let host = Arc::new(DummyHost::default());
        let mut b = RegistryBuilder::default();
        b.register_core_with_meta("host", &[], Arc::new(DummyCore));
        b.register_rest_host_with_meta("host", host.clone());
        b.register_core_with_meta("svc", &["host"], Arc::new(DummyCore));
        b.register_rest_with_meta("svc", Arc::new(DummyRest));
        let reg = b.build_topo_sorted().unwrap();

        let base_ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();
        reg.run_rest_phase(&base_ctx, Router::new()).unwrap();

        assert_eq!(host.schemas.load(Ordering::SeqCst), 1);
        assert_eq!(host.finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_registrators_applies_each_entry_point() {
        fn register_a(b: &mut RegistryBuilder) {
            b.register_core_with_meta("a", &[], Arc::new(DummyCore));
        }
        fn register_b(b: &mut RegistryBuilder) {
            b.register_core_with_meta("b", &["a"], Arc::new(DummyCore));
        }

        let reg = ModuleRegistry::from_registrators(&[register_b, register_a]).unwrap();
        assert_eq!(names(&reg), vec!["a", "b"]);
    }
}
