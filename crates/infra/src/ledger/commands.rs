//! Inputs of the ledger operations.
//!
//! Timestamps are supplied by the caller so operations stay deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::AssetId;
use siteledger_waybills::{ReturnLine, WaybillDetails, WaybillId, WaybillType};

/// Requested quantity of one asset. The asset name is resolved from the asset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub asset_id: AssetId,
    pub quantity: i64,
}

impl NewLineItem {
    pub fn new(asset_id: AssetId, quantity: i64) -> Self {
        Self { asset_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWaybill {
    /// Caller-chosen id; allocated from the type's prefix when absent.
    #[serde(default)]
    pub id: Option<WaybillId>,
    #[serde(rename = "type")]
    pub kind: WaybillType,
    pub details: WaybillDetails,
    pub items: Vec<NewLineItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToSite {
    pub waybill_id: WaybillId,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReturn {
    pub return_waybill_id: WaybillId,
    pub items: Vec<ReturnLine>,
    /// Outbound waybill the units were loaned on. When set, the same lines are
    /// recorded against its items too.
    #[serde(default)]
    pub source_waybill_id: Option<WaybillId>,
    pub occurred_at: DateTime<Utc>,
}

/// Delete a waybill, reversing whatever quantity effect it still has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWaybill {
    pub waybill_id: WaybillId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWaybill {
    pub waybill_id: WaybillId,
    pub details: WaybillDetails,
    pub items: Vec<NewLineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Create a return waybill and settle it in the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturnWaybill {
    pub details: WaybillDetails,
    pub items: Vec<ReturnLine>,
    #[serde(default)]
    pub source_waybill_id: Option<WaybillId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAsset {
    #[serde(default)]
    pub id: Option<AssetId>,
    pub name: String,
    pub unit: String,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_return_accepts_flat_condition_fields() {
        let asset = AssetId::new();
        let json = serde_json::json!({
            "returnWaybillId": "RB002",
            "items": [{ "assetId": asset.to_string(), "good": 8, "damaged": 3, "missing": 1 }],
            "occurredAt": "2026-03-01T08:00:00Z"
        });

        let cmd: ProcessReturn = serde_json::from_value(json).unwrap();
        assert_eq!(cmd.return_waybill_id.as_str(), "RB002");
        assert_eq!(cmd.items[0].breakdown.total(), 12);
        assert!(cmd.source_waybill_id.is_none());
    }
}
