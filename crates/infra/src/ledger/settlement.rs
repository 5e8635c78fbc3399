//! Return settlement shared by `process_return` and `create_return_waybill`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use siteledger_core::AssetId;
use siteledger_inventory::{Asset, MovementEntry, ReferenceType, ReturnBreakdown};
use siteledger_waybills::{Waybill, WaybillType};

use super::LedgerError;
use crate::store::LedgerTx;

/// Apply returned units to the asset records and the waybills involved.
///
/// Every check (line room on both waybills, site stock per asset) runs
/// before the first asset is written. Callers persist the waybills.
pub(crate) async fn settle_return(
    tx: &mut dyn LedgerTx,
    return_waybill: &mut Waybill,
    returns: &BTreeMap<AssetId, ReturnBreakdown>,
    source: Option<&mut Waybill>,
    at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    ensure_kind(return_waybill, WaybillType::Return)?;
    let site = return_waybill.site_id().clone();

    return_waybill.record_returns(returns, at)?;
    if let Some(source) = source {
        ensure_kind(source, WaybillType::Waybill)?;
        if source.site_id() != &site {
            return Err(LedgerError::Validation(format!(
                "waybill {} went to site {}, return {} comes from site {}",
                source.id_typed(),
                source.site_id(),
                return_waybill.id_typed(),
                site
            )));
        }
        source.record_returns(returns, at)?;
    }

    let mut settled: Vec<(Asset, ReturnBreakdown)> = Vec::with_capacity(returns.len());
    for (asset_id, breakdown) in returns {
        let asset = tx
            .load_asset(*asset_id)
            .await?
            .ok_or(LedgerError::AssetNotFound(*asset_id))?;
        asset.ensure_site_stock(&site, breakdown.total())?;
        settled.push((asset, *breakdown));
    }

    for (mut asset, breakdown) in settled {
        asset.settle_return(&site, &breakdown)?;
        tx.save_asset(&asset).await?;
        tx.append_movement(&MovementEntry::outbound(
            site.clone(),
            asset.id_typed(),
            asset.name(),
            breakdown.total(),
            return_waybill.id_typed().as_str(),
            ReferenceType::ReturnWaybill,
            Some(breakdown.dominant_condition()),
            at,
        ))
        .await?;
        debug!(
            asset_id = %asset.id_typed(),
            good = breakdown.good,
            damaged = breakdown.damaged,
            missing = breakdown.missing,
            "settled return"
        );
    }

    Ok(())
}

pub(crate) fn ensure_kind(waybill: &Waybill, expected: WaybillType) -> Result<(), LedgerError> {
    if waybill.kind() != expected {
        return Err(LedgerError::InvalidWaybillType {
            id: waybill.id_typed().clone(),
            expected: expected.to_string(),
            actual: waybill.kind().to_string(),
        });
    }
    Ok(())
}
