//! Ledger startup: open the local database and heal derived quantities.

use anyhow::Context;

use siteledger_infra::{IdAllocator, LedgerConfig, SqliteLedgerStore, WaybillLedger};
use siteledger_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env().context("invalid SITELEDGER_* configuration")?;
    siteledger_observability::init_with(LogFormat::from_json_flag(config.log_json));

    tracing::info!(
        database = %config.database_path.display(),
        max_connections = config.max_connections,
        "opening ledger database"
    );

    let store = SqliteLedgerStore::open(&config.database_path, config.max_connections)
        .await
        .with_context(|| format!("failed to open ledger database at {:?}", config.database_path))?;
    let ledger = WaybillLedger::with_allocator(store, IdAllocator::new(config.id_attempts));

    if config.reconcile_on_startup {
        let report = ledger
            .reconcile()
            .await
            .context("startup reconciliation failed")?;
        if report.is_clean() {
            tracing::info!(scanned = report.scanned, "ledger consistent");
        } else {
            tracing::warn!(
                scanned = report.scanned,
                corrected = report.corrected.len(),
                report = %serde_json::to_string(&report).context("failed to encode reconciliation report")?,
                "ledger drift corrected"
            );
        }
    }

    let assets = ledger.assets().await.context("failed to list assets")?;
    tracing::info!(assets = assets.len(), "ledger ready");
    Ok(())
}
