use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use modkit::runtime::{run, DbOptions, RunOptions, ShutdownOptions};
use modkit_db::{ConnectOpts, DbHandle};
use runtime::{AppConfig, AppConfigProvider, CliArgs, ConfigProvider, DatabaseConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// Adapter to make AppConfigProvider implement modkit::ConfigProvider
struct ModkitConfigAdapter(AppConfigProvider);

impl modkit::ConfigProvider for ModkitConfigAdapter {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.get_module_config(module_name)
    }
}

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// In-memory DSNs are returned unchanged; backslashes become forward slashes.
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if let Some(dir) = p.parent() {
        if create_dirs {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Voucher Server - voucher management REST API
#[derive(Parser)]
#[command(name = "voucher-server")]
#[command(about = "Voucher Server - voucher management REST API")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory SQLite database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);
    apply_server_section(&mut config, args.port.is_some());

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!(home_dir = %config.server.home_dir, "Voucher Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(&config),
    }
}

/// Copies the `server` section into the REST host's module section: `host:port` becomes
/// `bind_addr` and a non-zero `timeout_sec` becomes `request_timeout_secs`. Keys the module
/// section already sets are kept, except that `--port` always wins.
fn apply_server_section(config: &mut AppConfig, port_overridden: bool) {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let timeout_sec = config.server.timeout_sec;
    let section = config
        .modules
        .entry(api_ingress::MODULE_NAME.to_string())
        .or_insert_with(|| serde_json::json!({}));
    let Some(obj) = section.as_object_mut() else {
        return;
    };
    if port_overridden || !obj.contains_key("bind_addr") {
        obj.insert("bind_addr".to_string(), serde_json::Value::String(addr));
    }
    if timeout_sec > 0 && !obj.contains_key("request_timeout_secs") {
        obj.insert("request_timeout_secs".to_string(), timeout_sec.into());
    }
}

fn resolve_dsn(db_config: &DatabaseConfig, base_dir: &Path) -> Result<String> {
    let raw = db_config.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }
    DbHandle::detect(raw).with_context(|| format!("Invalid database DSN '{raw}'"))?;

    if raw.starts_with("sqlite://") {
        absolutize_sqlite_dsn(raw, base_dir, true)
    } else {
        Ok(raw.to_string())
    }
}

async fn connect_db(db_config: &DatabaseConfig, base_dir: &Path) -> Result<Arc<DbHandle>> {
    let dsn = resolve_dsn(db_config, base_dir)?;
    let connect_opts = ConnectOpts {
        max_conns: db_config.max_conns,
        acquire_timeout: Some(Duration::from_secs(5)),
        sqlite_busy_timeout: db_config
            .busy_timeout_ms
            .map(|ms| Duration::from_millis(ms as u64)),
        create_sqlite_dirs: true,
    };

    tracing::info!("Connecting to database: {}", dsn);
    let db = DbHandle::connect(&dsn, connect_opts)
        .await
        .with_context(|| format!("Failed to connect to {dsn}"))?;
    tracing::info!("Connected DB backend: {:?}", db.engine());
    Ok(Arc::new(db))
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules...");

    let base_dir = PathBuf::from(&config.server.home_dir);
    let db = match &config.database {
        Some(db_config) => DbOptions::Existing(connect_db(db_config, &base_dir).await?),
        None => {
            tracing::warn!("No database configuration found, running without database");
            DbOptions::None
        }
    };

    let config_provider = Arc::new(ModkitConfigAdapter(AppConfigProvider::new(config)));

    run(RunOptions {
        modules_cfg: config_provider,
        db,
        shutdown: ShutdownOptions::Signals,
        modules: vec![api_ingress::register, vouchers::register],
    })
    .await
}

/// Validates the DSN and the module sections without touching the database.
fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    if let Some(db_config) = &config.database {
        let raw = db_config.url.trim();
        DbHandle::detect(raw).with_context(|| format!("Invalid database DSN '{raw}'"))?;
    }

    if let Some(section) = config.module_section(api_ingress::MODULE_NAME) {
        let cfg: api_ingress::ApiIngressConfig = serde_json::from_value(section.clone())
            .context("Invalid modules.api_ingress section")?;
        cfg.bind_addr
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid bind address '{}'", cfg.bind_addr))?;
    }
    if let Some(section) = config.module_section(vouchers::MODULE_NAME) {
        let _: vouchers::VouchersConfig = serde_json::from_value(section.clone())
            .context("Invalid modules.vouchers section")?;
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sqlite_dsn_resolves_against_home() {
        let dir = std::env::temp_dir().join("voucher-server-dsn-test");
        let dsn = absolutize_sqlite_dsn("sqlite://database/vouchers.db?mode=rwc", &dir, false)
            .unwrap();
        let expected = format!(
            "sqlite://{}/database/vouchers.db?mode=rwc",
            dir.to_string_lossy().replace('\\', "/")
        );
        assert_eq!(dsn, expected);
    }

    #[test]
    fn memory_dsn_is_kept() {
        let dir = std::env::temp_dir();
        assert_eq!(
            absolutize_sqlite_dsn("sqlite://:memory:", &dir, false).unwrap(),
            "sqlite::memory:"
        );
        assert!(absolutize_sqlite_dsn("sqlite://", &dir, false).is_err());
    }

    #[test]
    fn bind_addr_follows_server_section_unless_set() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 9001;
        apply_server_section(&mut cfg, false);
        assert_eq!(cfg.modules["api_ingress"]["bind_addr"], "127.0.0.1:9001");

        cfg.modules.insert(
            "api_ingress".into(),
            serde_json::json!({ "bind_addr": "0.0.0.0:7000" }),
        );
        apply_server_section(&mut cfg, false);
        assert_eq!(cfg.modules["api_ingress"]["bind_addr"], "0.0.0.0:7000");

        apply_server_section(&mut cfg, true);
        assert_eq!(cfg.modules["api_ingress"]["bind_addr"], "127.0.0.1:9001");
    }

    #[test]
    fn server_timeout_becomes_request_timeout_unless_set() {
        let mut cfg = AppConfig::default();
        apply_server_section(&mut cfg, false);
        assert!(cfg.modules["api_ingress"].get("request_timeout_secs").is_none());

        cfg.server.timeout_sec = 45;
        apply_server_section(&mut cfg, false);
        assert_eq!(cfg.modules["api_ingress"]["request_timeout_secs"], 45);
        let parsed: api_ingress::ApiIngressConfig =
            serde_json::from_value(cfg.modules["api_ingress"].clone()).unwrap();
        assert_eq!(parsed.request_timeout_secs, 45);

        cfg.modules.insert(
            "api_ingress".into(),
            serde_json::json!({ "request_timeout_secs": 5 }),
        );
        apply_server_section(&mut cfg, false);
        assert_eq!(cfg.modules["api_ingress"]["request_timeout_secs"], 5);
    }
}
