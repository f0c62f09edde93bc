//! Process lifecycle: init → db → rest → start → wait → stop.
//!
//! One `ModuleCtx` is built up front and shared by every phase.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::client_hub::ClientHub;
use crate::context::{ConfigProvider, ModuleCtxBuilder};
use crate::registry::{ModuleRegistry, Registrator};

pub enum DbOptions {
    /// No database; the migration phase is skipped.
    None,
    Existing(Arc<modkit_db::DbHandle>),
}

pub enum ShutdownOptions {
    /// SIGTERM / SIGINT, or Ctrl+C off unix.
    Signals,
    Token(CancellationToken),
    /// Shutdown begins when the future completes.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    pub modules_cfg: Arc<dyn ConfigProvider>,
    pub db: DbOptions,
    pub shutdown: ShutdownOptions,
    pub modules: Vec<Registrator>,
}

pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = shutdown_token(opts.shutdown);
    let registry = ModuleRegistry::from_registrators(&opts.modules)?;
    tracing::info!(modules = registry.modules().len(), "Module registry built");

    let mut ctx = ModuleCtxBuilder::new(cancel.clone())
        .with_client_hub(Arc::new(ClientHub::default()))
        .with_config_provider(opts.modules_cfg);
    if let DbOptions::Existing(db) = &opts.db {
        ctx = ctx.with_db(db.clone());
    }
    let ctx = ctx.build();

    tracing::info!("Phase: init");
    registry.run_init_phase(&ctx).await?;

    if let DbOptions::Existing(db) = &opts.db {
        tracing::info!("Phase: db");
        registry.run_db_phase(db).await?;
    }

    tracing::info!("Phase: rest");
    // The REST host owns the finalized router; nothing else serves it.
    let _router = registry.run_rest_phase(&ctx, axum::Router::new())?;

    tracing::info!("Phase: start");
    registry.run_start_phase(cancel.clone()).await?;

    cancel.cancelled().await;

    tracing::info!("Phase: stop");
    registry.run_stop_phase(cancel).await;
    Ok(())
}

/// Token cancelled when the chosen shutdown trigger fires.
fn shutdown_token(shutdown: ShutdownOptions) -> CancellationToken {
    match shutdown {
        ShutdownOptions::Token(token) => {
            tracing::debug!("shutdown: external token controls lifecycle");
            token
        }
        ShutdownOptions::Signals => {
            let token = CancellationToken::new();
            let trigger = token.clone();
            tokio::spawn(async move {
                if let Err(e) = wait_for_signal().await {
                    tracing::warn!(error = %e, "shutdown: signal listener failed, waiting for Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                }
                trigger.cancel();
            });
            token
        }
        ShutdownOptions::Future(waiter) => {
            let token = CancellationToken::new();
            let trigger = token.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                trigger.cancel();
            });
            token
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("shutdown: SIGTERM"),
        _ = sigint.recv() => tracing::info!("shutdown: SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown: Ctrl+C");
    Ok(())
}
