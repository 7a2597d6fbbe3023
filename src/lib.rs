pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod llm;
pub mod sheet;
pub mod shell;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::event_bus::EventBus;
use crate::agent_engine::history::SessionHistory;
use crate::errors::SheetPilotResult;
use crate::llm::registry::ProviderRegistry;
use crate::sheet::workbook::InMemoryWorksheet;
use crate::shell::Shell;

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start tokio runtime");
            return;
        }
    };

    if let Err(e) = runtime.block_on(start()) {
        tracing::error!(error = %e, "SheetPilot exited with an error");
        eprintln!("Error: {e}");
    }
}

async fn start() -> SheetPilotResult<()> {
    let cfg = config::load_or_default()?;
    let registry = ProviderRegistry::from_config(&cfg);
    tracing::info!(providers = ?registry.list_names(), "LLM registry ready");

    let sheet = Arc::new(InMemoryWorksheet::open(&cfg.workbook.path)?);
    let history = if cfg.agent.record_history {
        SessionHistory::new()
    } else {
        SessionHistory::disabled()
    };
    if let Some(path) = history.file_path() {
        tracing::info!(path = %path.display(), "recording session history");
    }

    let engine = AgentEngine::new(
        sheet.clone(),
        Arc::new(Mutex::new(registry)),
        EventBus::default(),
        history,
        cfg.agent.clone(),
    );
    Shell::new(engine, sheet, cfg.workbook.playground.clone()).run().await
}
