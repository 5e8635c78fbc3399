//! Movement log entries: append-only audit of quantity transfers per site.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::{AssetId, DomainError, MovementId, SiteId};

use crate::condition::ItemCondition;

/// Direction of a movement relative to the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "in",
            MovementDirection::Out => "out",
        }
    }
}

impl FromStr for MovementDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementDirection::In),
            "out" => Ok(MovementDirection::Out),
            other => Err(DomainError::validation(format!("unknown movement type '{other}'"))),
        }
    }
}

/// Kind of document a movement was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Dispatch of an outbound waybill.
    Waybill,
    /// Settlement of a return.
    ReturnWaybill,
    /// Quantity correction after editing a dispatched waybill.
    WaybillAdjustment,
    /// Units pulled back when a partially returned waybill is deleted.
    WaybillReversal,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Waybill => "waybill",
            ReferenceType::ReturnWaybill => "return_waybill",
            ReferenceType::WaybillAdjustment => "waybill_adjustment",
            ReferenceType::WaybillReversal => "waybill_reversal",
        }
    }
}

impl FromStr for ReferenceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waybill" => Ok(ReferenceType::Waybill),
            "return_waybill" => Ok(ReferenceType::ReturnWaybill),
            "waybill_adjustment" => Ok(ReferenceType::WaybillAdjustment),
            "waybill_reversal" => Ok(ReferenceType::WaybillReversal),
            other => Err(DomainError::validation(format!("unknown reference type '{other}'"))),
        }
    }
}

/// One row of the movement log. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementEntry {
    pub id: MovementId,
    pub site_id: SiteId,
    pub asset_id: AssetId,
    pub asset_name: String,
    pub quantity: i64,
    #[serde(rename = "type")]
    pub direction: MovementDirection,
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub condition: Option<ItemCondition>,
    pub created_at: DateTime<Utc>,
}

impl MovementEntry {
    /// Units arriving at a site.
    pub fn inbound(
        site_id: SiteId,
        asset_id: AssetId,
        asset_name: impl Into<String>,
        quantity: i64,
        reference_id: impl Into<String>,
        reference_type: ReferenceType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            site_id,
            asset_id,
            asset_name: asset_name.into(),
            quantity,
            direction: MovementDirection::In,
            reference_id: reference_id.into(),
            reference_type,
            condition: None,
            created_at,
        }
    }

    /// Units leaving a site.
    #[allow(clippy::too_many_arguments)]
    pub fn outbound(
        site_id: SiteId,
        asset_id: AssetId,
        asset_name: impl Into<String>,
        quantity: i64,
        reference_id: impl Into<String>,
        reference_type: ReferenceType,
        condition: Option<ItemCondition>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            direction: MovementDirection::Out,
            condition,
            ..Self::inbound(
                site_id,
                asset_id,
                asset_name,
                quantity,
                reference_id,
                reference_type,
                created_at,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_entry_serializes_with_wire_names() {
        let entry = MovementEntry::outbound(
            SiteId::new("S1").unwrap(),
            AssetId::new(),
            "Ladder",
            12,
            "RB001",
            ReferenceType::ReturnWaybill,
            Some(ItemCondition::Damaged),
            Utc::now(),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "out");
        assert_eq!(json["referenceType"], "return_waybill");
        assert_eq!(json["condition"], "damaged");
        assert_eq!(json["siteId"], "S1");
    }

    #[test]
    fn reference_type_round_trips_through_as_str() {
        for rt in [
            ReferenceType::Waybill,
            ReferenceType::ReturnWaybill,
            ReferenceType::WaybillAdjustment,
            ReferenceType::WaybillReversal,
        ] {
            assert_eq!(rt.as_str().parse::<ReferenceType>().unwrap(), rt);
        }
    }
}
