pub mod adapters;
pub mod bridge;
pub mod commands;
pub mod debounce;
pub mod errors;
pub mod filter;
pub mod harness;
pub mod models;
pub mod projection;
pub mod settings;
pub mod surface;
pub mod sync;
pub mod tree;
pub mod warnings;

use crate::adapters::hypha::CliTopicSource;
use crate::bridge::Sidebar;
use crate::settings::SettingsHandle;
use crate::surface::StdioHost;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

const DATA_DIR_ENV: &str = "HYPHA_SIDEBAR_HOME";

/// Runs the sidebar as a sidecar: host messages on stdin, host frames on stdout.
pub fn run() -> anyhow::Result<()> {
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    if let Err(error) = init_tracing(&data_dir) {
        eprintln!("hypha-sidebar: logging disabled: {}", error);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let settings = SettingsHandle::default();
        let source = Arc::new(CliTopicSource::new(settings.clone()));
        let host = Arc::new(StdioHost::stdout());
        let sidebar = Sidebar::new(source, host, settings);
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "sidebar started");

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        sidebar.serve(stdin).await.map_err(to_client_error)
    })?;

    tracing::info!("sidebar stopped");
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| std::env::temp_dir().join("hypha-sidebar"))
}

fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "sidebar.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!(error.to_string())
}
