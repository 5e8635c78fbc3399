use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use siteledger_core::{AssetId, SiteId};
use siteledger_inventory::{Asset, MovementEntry, ReferenceType};
use siteledger_waybills::{
    LineItem, Waybill, WaybillId, WaybillStatus, WaybillType, group_return_lines, quantity_deltas,
};

use super::commands::{
    CreateReturnWaybill, CreateWaybill, DeleteWaybill, NewLineItem, ProcessReturn, RegisterAsset,
    SendToSite, UpdateWaybill,
};
use super::reconcile::{ReconciliationReport, reconcile_assets};
use super::settlement::{ensure_kind, settle_return};
use super::LedgerError;
use crate::allocator::IdAllocator;
use crate::store::{LedgerStore, LedgerTx};

/// Units of one asset currently at a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStockLine {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub unit: String,
    pub quantity: i64,
}

/// Transaction executor for asset quantities and waybills.
///
/// The store is injected; the ledger holds no other state.
#[derive(Debug, Clone)]
pub struct WaybillLedger<S> {
    store: S,
    allocator: IdAllocator,
}

impl<S: LedgerStore> WaybillLedger<S> {
    pub fn new(store: S) -> Self {
        Self::with_allocator(store, IdAllocator::default())
    }

    pub fn with_allocator(store: S, allocator: IdAllocator) -> Self {
        Self { store, allocator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a waybill.
    ///
    /// Outbound waybills reserve their quantities; return waybills only check
    /// that the site currently holds them.
    #[instrument(
        skip(self, cmd),
        fields(waybill_type = %cmd.kind, items = cmd.items.len()),
        err
    )]
    pub async fn create_waybill(&self, cmd: CreateWaybill) -> Result<WaybillId, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = self.create_waybill_in(&mut *tx, cmd).await;
        finish("create_waybill", tx, result).await
    }

    /// Dispatch an outstanding outbound waybill to its site.
    #[instrument(skip(self, cmd), fields(waybill_id = %cmd.waybill_id), err)]
    pub async fn send_to_site(&self, cmd: SendToSite) -> Result<Waybill, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = send_to_site_in(&mut *tx, cmd).await;
        finish("send_to_site", tx, result).await
    }

    /// Settle returned units against an existing return waybill.
    #[instrument(skip(self, cmd), fields(waybill_id = %cmd.return_waybill_id), err)]
    pub async fn process_return(&self, cmd: ProcessReturn) -> Result<Waybill, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = process_return_in(&mut *tx, cmd).await;
        finish("process_return", tx, result).await
    }

    /// Delete a waybill after reversing the quantity effect it still has.
    #[instrument(skip(self, cmd), fields(waybill_id = %cmd.waybill_id), err)]
    pub async fn delete_waybill(&self, cmd: DeleteWaybill) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = delete_waybill_in(&mut *tx, cmd).await;
        finish("delete_waybill", tx, result).await
    }

    /// Replace a waybill's details and lines, applying only the quantity deltas.
    #[instrument(
        skip(self, cmd),
        fields(waybill_id = %cmd.waybill_id, items = cmd.items.len()),
        err
    )]
    pub async fn update_waybill(&self, cmd: UpdateWaybill) -> Result<Waybill, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = update_waybill_in(&mut *tx, cmd).await;
        finish("update_waybill", tx, result).await
    }

    /// Create a return waybill and settle it in one step.
    #[instrument(skip(self, cmd), fields(site_id = %cmd.details.site_id, items = cmd.items.len()), err)]
    pub async fn create_return_waybill(
        &self,
        cmd: CreateReturnWaybill,
    ) -> Result<Waybill, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = self.create_return_waybill_in(&mut *tx, cmd).await;
        finish("create_return_waybill", tx, result).await
    }

    /// Recompute derived quantities on every asset. Running it twice in a row
    /// corrects nothing the second time.
    #[instrument(skip(self), err)]
    pub async fn reconcile(&self) -> Result<ReconciliationReport, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = reconcile_assets(&mut *tx).await;
        finish("reconcile", tx, result).await
    }

    /// Add an asset record. Existing assets are never overwritten.
    #[instrument(skip(self, cmd), fields(name = %cmd.name, quantity = cmd.quantity), err)]
    pub async fn register_asset(&self, cmd: RegisterAsset) -> Result<Asset, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = register_asset_in(&mut *tx, cmd).await;
        finish("register_asset", tx, result).await
    }

    pub async fn asset(&self, id: AssetId) -> Result<Asset, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = load_asset(&mut *tx, id).await;
        finish("asset", tx, result).await
    }

    pub async fn assets(&self) -> Result<Vec<Asset>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_assets().await.map_err(LedgerError::from);
        finish("assets", tx, result).await
    }

    pub async fn waybill(&self, id: &WaybillId) -> Result<Waybill, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = load_waybill(&mut *tx, id).await;
        finish("waybill", tx, result).await
    }

    /// Movement log of one site, oldest first.
    pub async fn site_movements(&self, site: &SiteId) -> Result<Vec<MovementEntry>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = tx.site_movements(site).await.map_err(LedgerError::from);
        finish("site_movements", tx, result).await
    }

    /// Assets with units currently at `site`.
    pub async fn site_stock(&self, site: &SiteId) -> Result<Vec<SiteStockLine>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_assets().await.map_err(LedgerError::from).map(|assets| {
            assets
                .into_iter()
                .filter(|a| a.site_quantity(site) > 0)
                .map(|a| SiteStockLine {
                    asset_id: a.id_typed(),
                    asset_name: a.name().to_string(),
                    unit: a.unit().to_string(),
                    quantity: a.site_quantity(site),
                })
                .collect()
        });
        finish("site_stock", tx, result).await
    }

    async fn create_waybill_in(
        &self,
        tx: &mut dyn LedgerTx,
        cmd: CreateWaybill,
    ) -> Result<WaybillId, LedgerError> {
        let id = match cmd.id {
            Some(id) => {
                if tx.waybill_exists(&id).await? {
                    return Err(LedgerError::DuplicateId(id));
                }
                id
            }
            None => self.allocator.allocate(tx, cmd.kind.prefix()).await?,
        };

        let items = line_items(tx, &cmd.items).await?;
        let waybill = Waybill::new(id, cmd.kind, cmd.details, items, cmd.occurred_at)?;
        let site = waybill.site_id().clone();

        for (asset_id, quantity) in waybill.quantities_by_asset() {
            let mut asset = load_asset(tx, asset_id).await?;
            if waybill.is_return() {
                asset.ensure_site_stock(&site, quantity)?;
                continue;
            }
            asset.reserve(quantity)?;
            tx.save_asset(&asset).await?;
        }

        tx.insert_waybill(&waybill).await?;
        Ok(waybill.id_typed().clone())
    }

    async fn create_return_waybill_in(
        &self,
        tx: &mut dyn LedgerTx,
        cmd: CreateReturnWaybill,
    ) -> Result<Waybill, LedgerError> {
        let returns = group_return_lines(&cmd.items)?;

        let mut items = Vec::with_capacity(returns.len());
        for (asset_id, breakdown) in &returns {
            let asset = load_asset(tx, *asset_id).await?;
            items.push(LineItem::new(*asset_id, asset.name(), breakdown.total()));
        }

        let mut source = match &cmd.source_waybill_id {
            Some(id) => Some(load_waybill(tx, id).await?),
            None => None,
        };

        let id = self.allocator.allocate(tx, WaybillType::Return.prefix()).await?;
        let mut waybill = Waybill::new(id, WaybillType::Return, cmd.details, items, cmd.occurred_at)?;

        settle_return(tx, &mut waybill, &returns, source.as_mut(), cmd.occurred_at).await?;

        tx.insert_waybill(&waybill).await?;
        if let Some(source) = &source {
            tx.save_waybill(source).await?;
        }
        Ok(waybill)
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    operation: &'static str,
    tx: Box<dyn LedgerTx>,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            debug!(operation, "committed");
            Ok(value)
        }
        Err(err) => {
            warn!(operation, error = %err, "rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(operation, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn send_to_site_in(tx: &mut dyn LedgerTx, cmd: SendToSite) -> Result<Waybill, LedgerError> {
    let mut waybill = load_waybill(tx, &cmd.waybill_id).await?;
    ensure_kind(&waybill, WaybillType::Waybill)?;
    waybill.mark_sent_to_site(cmd.sent_at)?;

    let site = waybill.site_id().clone();
    for item in waybill.items() {
        let mut asset = load_asset(tx, item.asset_id).await?;
        asset.deploy_to_site(&site, item.quantity)?;
        tx.save_asset(&asset).await?;
        tx.append_movement(&MovementEntry::inbound(
            site.clone(),
            item.asset_id,
            item.asset_name.as_str(),
            item.quantity,
            waybill.id_typed().as_str(),
            ReferenceType::Waybill,
            cmd.sent_at,
        ))
        .await?;
    }

    tx.save_waybill(&waybill).await?;
    Ok(waybill)
}

async fn process_return_in(
    tx: &mut dyn LedgerTx,
    cmd: ProcessReturn,
) -> Result<Waybill, LedgerError> {
    let mut return_waybill = load_waybill(tx, &cmd.return_waybill_id).await?;
    ensure_kind(&return_waybill, WaybillType::Return)?;
    let returns = group_return_lines(&cmd.items)?;

    let mut source = match &cmd.source_waybill_id {
        Some(id) => Some(load_waybill(tx, id).await?),
        None => None,
    };

    settle_return(tx, &mut return_waybill, &returns, source.as_mut(), cmd.occurred_at).await?;

    tx.save_waybill(&return_waybill).await?;
    if let Some(source) = &source {
        tx.save_waybill(source).await?;
    }
    Ok(return_waybill)
}

async fn delete_waybill_in(tx: &mut dyn LedgerTx, cmd: DeleteWaybill) -> Result<(), LedgerError> {
    let waybill = load_waybill(tx, &cmd.waybill_id).await?;

    if waybill.is_return() {
        if waybill.status() != WaybillStatus::Outstanding {
            return Err(LedgerError::Validation(format!(
                "return waybill {} is {}; only outstanding returns can be deleted",
                waybill.id_typed(),
                waybill.status()
            )));
        }
    } else {
        reverse_outbound(tx, &waybill, cmd.occurred_at).await?;
    }

    tx.delete_waybill(waybill.id_typed()).await?;
    Ok(())
}

/// Undo whatever an outbound waybill still holds: the reservation while
/// outstanding, plus the site units once dispatched.
async fn reverse_outbound(
    tx: &mut dyn LedgerTx,
    waybill: &Waybill,
    at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let site = waybill.site_id();
    let reference = waybill.id_typed().as_str();

    match waybill.status() {
        WaybillStatus::Outstanding => {
            for (asset_id, quantity) in waybill.quantities_by_asset() {
                let mut asset = load_asset(tx, asset_id).await?;
                asset.release(quantity);
                tx.save_asset(&asset).await?;
            }
        }
        WaybillStatus::SentToSite => {
            for (asset_id, quantity) in waybill.remaining_by_asset() {
                let mut asset = load_asset(tx, asset_id).await?;
                asset.withdraw_from_site(site, quantity);
                asset.release(quantity);
                tx.save_asset(&asset).await?;
            }
            let removed = tx
                .delete_movements(
                    reference,
                    &[ReferenceType::Waybill, ReferenceType::WaybillAdjustment],
                )
                .await?;
            debug!(waybill_id = %waybill.id_typed(), removed, "removed dispatch movements");
        }
        WaybillStatus::PartialReturned => {
            for (asset_id, quantity) in waybill.remaining_by_asset() {
                let mut asset = load_asset(tx, asset_id).await?;
                let removed = asset.withdraw_from_site(site, quantity);
                asset.release(quantity);
                tx.save_asset(&asset).await?;
                if removed > 0 {
                    tx.append_movement(&MovementEntry::outbound(
                        site.clone(),
                        asset_id,
                        asset.name(),
                        removed,
                        reference,
                        ReferenceType::WaybillReversal,
                        None,
                        at,
                    ))
                    .await?;
                }
            }
        }
        WaybillStatus::ReturnCompleted => {}
    }
    Ok(())
}

async fn update_waybill_in(
    tx: &mut dyn LedgerTx,
    cmd: UpdateWaybill,
) -> Result<Waybill, LedgerError> {
    let mut waybill = load_waybill(tx, &cmd.waybill_id).await?;
    if !waybill.is_editable() {
        return Err(LedgerError::Validation(format!(
            "waybill {} is {} and can no longer be edited",
            waybill.id_typed(),
            waybill.status()
        )));
    }

    let old = waybill.quantities_by_asset();
    let old_site = waybill.site_id().clone();

    let items = line_items(tx, &cmd.items).await?;
    waybill.edit(cmd.details, items, cmd.occurred_at)?;

    let new = waybill.quantities_by_asset();
    let new_site = waybill.site_id().clone();

    if waybill.is_return() {
        for (asset_id, quantity) in &new {
            let asset = load_asset(tx, *asset_id).await?;
            asset.ensure_site_stock(&new_site, *quantity)?;
        }
    } else {
        apply_reservation_deltas(tx, &quantity_deltas(&old, &new)).await?;
        if waybill.status() == WaybillStatus::SentToSite {
            let reference = waybill.id_typed().as_str();
            if old_site == new_site {
                let deltas = quantity_deltas(&old, &new);
                move_site_units(tx, &new_site, &deltas, reference, cmd.occurred_at).await?;
            } else {
                let withdrawn: BTreeMap<AssetId, i64> = old.iter().map(|(a, q)| (*a, -q)).collect();
                move_site_units(tx, &old_site, &withdrawn, reference, cmd.occurred_at).await?;
                move_site_units(tx, &new_site, &new, reference, cmd.occurred_at).await?;
            }
        }
    }

    tx.save_waybill(&waybill).await?;
    Ok(waybill)
}

/// Reserve positive deltas (availability-checked) and release negative ones.
async fn apply_reservation_deltas(
    tx: &mut dyn LedgerTx,
    deltas: &BTreeMap<AssetId, i64>,
) -> Result<(), LedgerError> {
    for (asset_id, delta) in deltas {
        let mut asset = load_asset(tx, *asset_id).await?;
        if *delta > 0 {
            asset.reserve(*delta)?;
        } else {
            asset.release(-delta);
        }
        tx.save_asset(&asset).await?;
    }
    Ok(())
}

/// Deploy positive and withdraw negative per-asset changes at `site`,
/// recording each as an adjustment movement.
async fn move_site_units(
    tx: &mut dyn LedgerTx,
    site: &SiteId,
    changes: &BTreeMap<AssetId, i64>,
    reference: &str,
    at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    for (asset_id, change) in changes {
        let mut asset = load_asset(tx, *asset_id).await?;
        let entry = if *change > 0 {
            asset.deploy_to_site(site, *change)?;
            MovementEntry::inbound(
                site.clone(),
                *asset_id,
                asset.name(),
                *change,
                reference,
                ReferenceType::WaybillAdjustment,
                at,
            )
        } else {
            let removed = asset.withdraw_from_site(site, -change);
            if removed == 0 {
                tx.save_asset(&asset).await?;
                continue;
            }
            MovementEntry::outbound(
                site.clone(),
                *asset_id,
                asset.name(),
                removed,
                reference,
                ReferenceType::WaybillAdjustment,
                None,
                at,
            )
        };
        tx.save_asset(&asset).await?;
        tx.append_movement(&entry).await?;
    }
    Ok(())
}

async fn register_asset_in(tx: &mut dyn LedgerTx, cmd: RegisterAsset) -> Result<Asset, LedgerError> {
    let id = cmd.id.unwrap_or_default();
    if tx.load_asset(id).await?.is_some() {
        return Err(LedgerError::Validation(format!("asset {id} already exists")));
    }
    let asset = Asset::register(id, cmd.name, cmd.unit, cmd.quantity)?;
    tx.insert_asset(&asset).await?;
    Ok(asset)
}

async fn line_items(
    tx: &mut dyn LedgerTx,
    requested: &[NewLineItem],
) -> Result<Vec<LineItem>, LedgerError> {
    let mut items = Vec::with_capacity(requested.len());
    for line in requested {
        let asset = load_asset(tx, line.asset_id).await?;
        items.push(LineItem::new(line.asset_id, asset.name(), line.quantity));
    }
    Ok(items)
}

async fn load_asset(tx: &mut dyn LedgerTx, id: AssetId) -> Result<Asset, LedgerError> {
    tx.load_asset(id).await?.ok_or(LedgerError::AssetNotFound(id))
}

async fn load_waybill(tx: &mut dyn LedgerTx, id: &WaybillId) -> Result<Waybill, LedgerError> {
    tx.load_waybill(id)
        .await?
        .ok_or_else(|| LedgerError::WaybillNotFound(id.clone()))
}
