// # gatehoused - Gatehouse Daemon
//
// Thin integration layer around gatehouse-core. The daemon is
// responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and the storage provider
// 3. Starting the DDNS resolver background task
// 4. Handing the decision engine to the request-handling layer
//
// All access-control logic lives in gatehouse-core; nothing here makes
// decisions.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `GATEHOUSE_STORE_TYPE`: storage backend (file, memory; default file)
// - `GATEHOUSE_STORE_PATH`: path to the store document (for file store)
// - `GATEHOUSE_ADMIN_SECRET`: secret required by the administrative surface
// - `GATEHOUSE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export GATEHOUSE_STORE_TYPE=file
// export GATEHOUSE_STORE_PATH=/var/lib/gatehouse/store.json
// export GATEHOUSE_ADMIN_SECRET=change-me
//
// gatehoused
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use gatehouse_core::{
    Config, DdnsResolver, Engine, FileProvider, MemoryProvider, Provider, StoreConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration: the core config plus daemon-only knobs
struct DaemonConfig {
    core: Config,
    log_level: String,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let store = store_from_env(
            env::var("GATEHOUSE_STORE_TYPE").ok(),
            env::var("GATEHOUSE_STORE_PATH").ok(),
        )?;
        Ok(Self {
            core: Config {
                store,
                admin_secret: env::var("GATEHOUSE_ADMIN_SECRET").ok(),
            },
            log_level: env::var("GATEHOUSE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.core.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GATEHOUSE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Map the environment selection onto the core store configuration
fn store_from_env(kind: Option<String>, path: Option<String>) -> Result<StoreConfig> {
    match kind.as_deref().unwrap_or("file") {
        "file" => {
            let path = path.filter(|p| !p.is_empty()).ok_or_else(|| {
                anyhow::anyhow!(
                    "GATEHOUSE_STORE_PATH is required when GATEHOUSE_STORE_TYPE=file. \
                    Set it via: export GATEHOUSE_STORE_PATH=/var/lib/gatehouse/store.json"
                )
            })?;
            Ok(StoreConfig::File { path })
        }
        "memory" => Ok(StoreConfig::Memory),
        other => anyhow::bail!(
            "GATEHOUSE_STORE_TYPE '{}' is not supported. \
            Supported types: file, memory",
            other
        ),
    }
}

fn main() -> ExitCode {
    let config = match DaemonConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting gatehoused daemon");
    info!("Storage backend: {}", config.core.store.type_name());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    // Build the storage provider selected by configuration
    let provider: Arc<dyn Provider> = match &config.core.store {
        StoreConfig::File { path } => {
            info!("Using file store at {}", path);
            Arc::new(FileProvider::new(path))
        }
        StoreConfig::Memory => {
            warn!("Memory store selected; state will not survive a restart");
            Arc::new(MemoryProvider::new())
        }
    };
    provider.initialize_database().await?;
    provider.check_availability().await?;

    if config.core.admin_secret.is_none() {
        warn!("GATEHOUSE_ADMIN_SECRET is not set; administrative calls are unauthenticated");
    }

    // Start the DDNS resolution loop
    let resolver = DdnsResolver::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let resolver_task = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.run_with_shutdown(shutdown_rx).await })
    };

    // The engine is what the request-handling layer in front of this
    // daemon consumes; it holds the only references the core needs.
    let _engine = Engine::new(Arc::clone(&provider), resolver);

    info!("Daemon initialized successfully");

    let signal_name = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal_name);

    // Cooperative shutdown: the resolver loop exits before its next
    // wait cycle; an in-flight resolution pass completes first.
    let _ = shutdown_tx.send(());
    resolver_task.await??;

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
