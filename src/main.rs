//! bank_ledger - Transfer Execution Engine service
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Logging  │───▶│  Store   │───▶│ Gateway  │
//! │  (YAML)  │    │(tracing) │    │(mem | pg)│    │  (axum)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;

use bank_ledger::config::{AppConfig, StorageBackend};
use bank_ledger::db::Database;
use bank_ledger::gateway::{run_server, state::AppState};
use bank_ledger::logging::init_logging;
use bank_ledger::store::schema::init_schema;
use bank_ledger::store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use bank_ledger::transfer::{
    ExecutorConfig, LedgerService, TransferExecutor, UlidReferenceGenerator,
};

/// `--env <name>` / `-e <name>`, then `APP_ENV`, then `dev`
fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let lock_timeout = config.transfer.lock_timeout();
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("In-memory storage selected: ledger is lost on exit");
            Ok(Arc::new(MemoryLedgerStore::new(lock_timeout)))
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .postgres_url
                .as_deref()
                .context("storage.postgres_url is not set")?;
            let db = Database::connect(url, &config.storage)
                .await
                .context("Failed to connect to PostgreSQL")?;
            init_schema(db.pool()).await?;
            Ok(Arc::new(PgLedgerStore::new(db.pool().clone(), lock_timeout)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&config);

    tracing::info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.storage.backend,
        "Starting bank_ledger"
    );

    if config.auth.jwt_secret.is_empty() {
        anyhow::bail!("auth.jwt_secret must be set");
    }

    let store = build_store(&config).await?;
    let executor = TransferExecutor::new(
        store,
        Arc::new(UlidReferenceGenerator::new()),
        ExecutorConfig::from(&config.transfer),
    );
    let state = AppState::new(LedgerService::new(executor), &config.auth.jwt_secret);

    run_server(&config.gateway, state).await
}
