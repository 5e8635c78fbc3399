use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::{AssetId, DomainError, DomainResult, Entity, SiteId};
use siteledger_inventory::{MAX_QUANTITY, ReturnBreakdown};

use crate::id::{WaybillId, WaybillPrefix};

/// Document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaybillType {
    /// Outbound loan from the office to a site.
    Waybill,
    /// Return of units from a site.
    Return,
}

impl WaybillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaybillType::Waybill => "waybill",
            WaybillType::Return => "return",
        }
    }

    pub fn prefix(&self) -> WaybillPrefix {
        match self {
            WaybillType::Waybill => WaybillPrefix::Waybill,
            WaybillType::Return => WaybillPrefix::Return,
        }
    }
}

impl core::fmt::Display for WaybillType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for WaybillType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waybill" => Ok(WaybillType::Waybill),
            "return" => Ok(WaybillType::Return),
            other => Err(DomainError::validation(format!("unknown waybill type '{other}'"))),
        }
    }
}

/// Waybill (and line item) lifecycle.
///
/// ```text
/// outbound: outstanding -> sent_to_site -> partial_returned -> return_completed
///                                       \-------------------> return_completed
/// return:   outstanding -> partial_returned -> return_completed
///                       \-------------------> return_completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaybillStatus {
    Outstanding,
    SentToSite,
    PartialReturned,
    ReturnCompleted,
}

impl WaybillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaybillStatus::Outstanding => "outstanding",
            WaybillStatus::SentToSite => "sent_to_site",
            WaybillStatus::PartialReturned => "partial_returned",
            WaybillStatus::ReturnCompleted => "return_completed",
        }
    }

    /// Whether a waybill of `kind` may move from `self` to `next`.
    pub fn can_transition_to(self, next: WaybillStatus, kind: WaybillType) -> bool {
        use WaybillStatus::*;
        match (kind, self, next) {
            (WaybillType::Waybill, Outstanding, SentToSite) => true,
            (WaybillType::Waybill, SentToSite, PartialReturned | ReturnCompleted) => true,
            (WaybillType::Return, Outstanding, PartialReturned | ReturnCompleted) => true,
            (_, PartialReturned, PartialReturned | ReturnCompleted) => true,
            _ => false,
        }
    }

    /// Statuses from which returns can be recorded against a waybill of `kind`.
    pub fn accepts_returns(self, kind: WaybillType) -> bool {
        self.can_transition_to(WaybillStatus::ReturnCompleted, kind)
    }
}

impl core::fmt::Display for WaybillStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for WaybillStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outstanding" => Ok(WaybillStatus::Outstanding),
            "sent_to_site" => Ok(WaybillStatus::SentToSite),
            "partial_returned" => Ok(WaybillStatus::PartialReturned),
            "return_completed" => Ok(WaybillStatus::ReturnCompleted),
            other => Err(DomainError::validation(format!("unknown waybill status '{other}'"))),
        }
    }
}

/// One asset line on a waybill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub returned_quantity: i64,
    #[serde(default)]
    pub return_breakdown: ReturnBreakdown,
    pub status: WaybillStatus,
}

impl LineItem {
    pub fn new(asset_id: AssetId, asset_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            asset_id,
            asset_name: asset_name.into(),
            quantity,
            returned_quantity: 0,
            return_breakdown: ReturnBreakdown::default(),
            status: WaybillStatus::Outstanding,
        }
    }

    pub fn remaining(&self) -> i64 {
        (self.quantity - self.returned_quantity).max(0)
    }

    pub fn is_fully_returned(&self) -> bool {
        self.returned_quantity >= self.quantity
    }
}

/// Descriptive fields of a waybill. None of them affect quantities except
/// `site_id`, which names where units go to (or come back from).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaybillDetails {
    pub site_id: SiteId,
    pub return_to_site_id: Option<SiteId>,
    pub driver_name: String,
    pub vehicle: String,
    pub issue_date: DateTime<Utc>,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub purpose: String,
}

/// Waybill record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waybill {
    id: WaybillId,
    #[serde(rename = "type")]
    kind: WaybillType,
    details: WaybillDetails,
    status: WaybillStatus,
    items: Vec<LineItem>,
    sent_to_site_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Waybill {
    /// Create a new waybill in `outstanding`.
    pub fn new(
        id: WaybillId,
        kind: WaybillType,
        details: WaybillDetails,
        items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_items(&items)?;
        let items = items
            .into_iter()
            .map(|item| LineItem {
                returned_quantity: 0,
                return_breakdown: ReturnBreakdown::default(),
                status: WaybillStatus::Outstanding,
                ..item
            })
            .collect();

        Ok(Self {
            id,
            kind,
            details,
            status: WaybillStatus::Outstanding,
            items,
            sent_to_site_date: None,
            created_at,
            updated_at: created_at,
        })
    }

    /// Rebuild a waybill from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrate(
        id: WaybillId,
        kind: WaybillType,
        details: WaybillDetails,
        status: WaybillStatus,
        items: Vec<LineItem>,
        sent_to_site_date: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            details,
            status,
            items,
            sent_to_site_date,
            created_at,
            updated_at,
        }
    }

    pub fn id_typed(&self) -> &WaybillId {
        &self.id
    }

    pub fn kind(&self) -> WaybillType {
        self.kind
    }

    pub fn is_return(&self) -> bool {
        self.kind == WaybillType::Return
    }

    pub fn details(&self) -> &WaybillDetails {
        &self.details
    }

    pub fn site_id(&self) -> &SiteId {
        &self.details.site_id
    }

    pub fn status(&self) -> WaybillStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn sent_to_site_date(&self) -> Option<DateTime<Utc>> {
        self.sent_to_site_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_editable(&self) -> bool {
        matches!(self.status, WaybillStatus::Outstanding | WaybillStatus::SentToSite)
    }

    /// Total line quantity per asset.
    pub fn quantities_by_asset(&self) -> BTreeMap<AssetId, i64> {
        sum_by_asset(self.items.iter().map(|i| (i.asset_id, i.quantity)))
    }

    /// Not-yet-returned quantity per asset (assets with nothing left are omitted).
    pub fn remaining_by_asset(&self) -> BTreeMap<AssetId, i64> {
        let mut remaining = sum_by_asset(self.items.iter().map(|i| (i.asset_id, i.remaining())));
        remaining.retain(|_, q| *q > 0);
        remaining
    }

    /// `outstanding -> sent_to_site` (outbound only).
    pub fn mark_sent_to_site(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.transition(WaybillStatus::SentToSite)?;
        self.sent_to_site_date = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Record returned units against the line items.
    ///
    /// All assets are validated before any line changes: returning more than
    /// a line still expects, or an asset the waybill does not carry, fails the
    /// whole call. Afterwards each line is `return_completed` once fully
    /// returned (else `partial_returned`), and the waybill is
    /// `return_completed` only when every line is.
    pub fn record_returns(
        &mut self,
        returns: &BTreeMap<AssetId, ReturnBreakdown>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.status.accepts_returns(self.kind) {
            return Err(DomainError::invalid_transition(
                self.status,
                WaybillStatus::PartialReturned,
            ));
        }

        let remaining = self.remaining_by_asset();
        for (asset_id, breakdown) in returns {
            breakdown.validate()?;
            let open = remaining.get(asset_id).copied().unwrap_or(0);
            if breakdown.total() > open {
                return Err(DomainError::validation(format!(
                    "waybill {} expects {} more unit(s) of asset {}, got {}",
                    self.id,
                    open,
                    asset_id,
                    breakdown.total()
                )));
            }
        }

        for (asset_id, breakdown) in returns {
            self.distribute_return(asset_id, *breakdown);
        }

        let next = if self.items.iter().all(LineItem::is_fully_returned) {
            WaybillStatus::ReturnCompleted
        } else {
            WaybillStatus::PartialReturned
        };
        self.transition(next)?;
        self.updated_at = at;
        Ok(())
    }

    /// Replace descriptive fields and line items.
    ///
    /// Only `outstanding` and `sent_to_site` waybills can be edited; once a
    /// return is recorded the lines are settled history.
    pub fn edit(
        &mut self,
        details: WaybillDetails,
        items: Vec<LineItem>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.is_editable() {
            return Err(DomainError::validation(format!(
                "waybill {} is {} and can no longer be edited",
                self.id, self.status
            )));
        }
        validate_items(&items)?;

        let line_status = self.status;
        self.items = items
            .into_iter()
            .map(|item| LineItem {
                returned_quantity: 0,
                return_breakdown: ReturnBreakdown::default(),
                status: line_status,
                ..item
            })
            .collect();
        self.details = details;
        self.updated_at = at;
        Ok(())
    }

    fn transition(&mut self, next: WaybillStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next, self.kind) {
            return Err(DomainError::invalid_transition(self.status, next));
        }
        self.status = next;
        if next == WaybillStatus::SentToSite {
            for item in &mut self.items {
                item.status = WaybillStatus::SentToSite;
            }
        }
        Ok(())
    }

    /// Spread one asset's returned units over its lines in order, good units
    /// first, then damaged, then missing.
    fn distribute_return(&mut self, asset_id: &AssetId, breakdown: ReturnBreakdown) {
        let mut left = breakdown;
        for item in self.items.iter_mut().filter(|i| &i.asset_id == asset_id) {
            let mut room = item.remaining();
            if room == 0 {
                continue;
            }
            let good = left.good.min(room);
            room -= good;
            let damaged = left.damaged.min(room);
            room -= damaged;
            let missing = left.missing.min(room);

            let taken = ReturnBreakdown::new(good, damaged, missing);
            left.good -= good;
            left.damaged -= damaged;
            left.missing -= missing;

            item.returned_quantity += taken.total();
            item.return_breakdown += taken;
            item.status = if item.is_fully_returned() {
                WaybillStatus::ReturnCompleted
            } else {
                WaybillStatus::PartialReturned
            };

            if left.is_empty() {
                break;
            }
        }
    }
}

impl Entity for Waybill {
    type Id = WaybillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_items(items: &[LineItem]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("waybill must have at least one item"));
    }
    if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
        return Err(DomainError::validation(format!(
            "line quantity for {} must be positive",
            bad.asset_name
        )));
    }
    if let Some(bad) = items.iter().find(|i| i.quantity > MAX_QUANTITY) {
        return Err(DomainError::validation(format!(
            "line quantity for {} cannot exceed {MAX_QUANTITY}",
            bad.asset_name
        )));
    }
    Ok(())
}

fn sum_by_asset(pairs: impl Iterator<Item = (AssetId, i64)>) -> BTreeMap<AssetId, i64> {
    let mut out = BTreeMap::new();
    for (asset, qty) in pairs {
        let total = out.entry(asset).or_insert(0);
        *total = i64::saturating_add(*total, qty);
    }
    out
}
