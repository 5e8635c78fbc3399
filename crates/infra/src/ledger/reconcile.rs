//! Startup repair of derived asset quantities.

use serde::{Deserialize, Serialize};
use tracing::info;

use siteledger_core::AssetId;

use super::LedgerError;
use crate::store::LedgerTx;

/// One asset rewritten by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCorrection {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub stored_available: i64,
    pub recomputed_available: i64,
    /// Zero-valued site entries were dropped.
    pub pruned_sites: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub scanned: usize,
    pub corrected: Vec<AssetCorrection>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.corrected.is_empty()
    }
}

/// Recompute every asset's available quantity and persist the ones that drifted.
pub(crate) async fn reconcile_assets(
    tx: &mut dyn LedgerTx,
) -> Result<ReconciliationReport, LedgerError> {
    let assets = tx.list_assets().await?;
    let mut report = ReconciliationReport {
        scanned: assets.len(),
        corrected: Vec::new(),
    };

    for mut asset in assets {
        let stored_available = asset.available_quantity();
        let pruned_sites = asset.prune_sites();
        let drifted = asset.recompute_available();
        if !(drifted || pruned_sites) {
            continue;
        }

        tx.save_asset(&asset).await?;
        info!(
            asset_id = %asset.id_typed(),
            stored_available,
            recomputed_available = asset.available_quantity(),
            pruned_sites,
            "reconciled asset"
        );
        report.corrected.push(AssetCorrection {
            asset_id: asset.id_typed(),
            asset_name: asset.name().to_string(),
            stored_available,
            recomputed_available: asset.available_quantity(),
            pruned_sites,
        });
    }

    Ok(report)
}
