//! Return lines as entered by the caller, grouped per asset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use siteledger_core::{AssetId, DomainError, DomainResult};
use siteledger_inventory::ReturnBreakdown;

/// Units of one asset coming back, split by condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLine {
    pub asset_id: AssetId,
    #[serde(flatten)]
    pub breakdown: ReturnBreakdown,
}

impl ReturnLine {
    pub fn new(asset_id: AssetId, good: i64, damaged: i64, missing: i64) -> Self {
        Self {
            asset_id,
            breakdown: ReturnBreakdown::new(good, damaged, missing),
        }
    }
}

/// Sum return lines per asset.
///
/// Lines with nothing returned are skipped; a return with no units at all is
/// rejected.
pub fn group_return_lines(lines: &[ReturnLine]) -> DomainResult<BTreeMap<AssetId, ReturnBreakdown>> {
    let mut grouped: BTreeMap<AssetId, ReturnBreakdown> = BTreeMap::new();
    for line in lines {
        line.breakdown.validate()?;
        if line.breakdown.is_empty() {
            continue;
        }
        let entry = grouped.entry(line.asset_id).or_default();
        *entry = entry
            .checked_add(line.breakdown)
            .ok_or_else(|| DomainError::validation(format!("return quantity for {} overflows", line.asset_id)))?;
        entry.validate()?;
    }
    if grouped.is_empty() {
        return Err(DomainError::validation("return contains no quantities"));
    }
    Ok(grouped)
}
