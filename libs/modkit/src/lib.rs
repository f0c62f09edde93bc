//! # ModKit
//!
//! Module system for the voucher server. Each module crate exposes a `register` function
//! that fills a [`registry::RegistryBuilder`] with its core and capabilities; the runner
//! orders modules by their declared dependencies and drives them through
//! init → DB → REST → start → stop.
//!
//! ```rust,ignore
//! modkit::runtime::run(RunOptions {
//!     modules_cfg,
//!     db: DbOptions::Existing(db),
//!     shutdown: ShutdownOptions::Signals,
//!     modules: vec![api_ingress::register, vouchers::register],
//! })
//! .await?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod api;
pub mod client_hub;
pub mod context;
pub mod contracts;
pub mod http;
pub mod registry;
pub mod runtime;

pub use api::problem::{Problem, ProblemResponse, ValidationError};
pub use api::{OpenApiRegistry, OperationBuilder};
pub use client_hub::ClientHub;
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
pub use contracts::*;
pub use http::client::TracedClient;
pub use registry::{ModuleRegistry, Registrator, RegistryBuilder};
pub use runtime::{run, DbOptions, RunOptions, ShutdownOptions};
