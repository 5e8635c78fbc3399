use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use siteledger_core::{AssetId, SiteId};
use siteledger_inventory::{Asset, MovementEntry, ReferenceType};
use siteledger_waybills::{Waybill, WaybillId};

/// Storage failure.
///
/// These are **infrastructure errors** as opposed to ledger rule violations
/// (stock shortfalls, unknown ids), which the executor reports itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt {table} row {id}: {reason}")]
    Corrupt {
        table: &'static str,
        id: String,
        reason: String,
    },

    #[error("duplicate {table} row {id}")]
    Duplicate { table: &'static str, id: String },

    #[error("missing {table} row {id}")]
    Missing { table: &'static str, id: String },
}

/// One atomic unit of work against the ledger tables.
///
/// Reads observe the unit's own earlier writes. Nothing is visible to other
/// units until [`LedgerTx::commit`]; dropping a unit without committing
/// discards it.
#[async_trait]
pub trait LedgerTx: Send {
    async fn load_asset(&mut self, id: AssetId) -> Result<Option<Asset>, StoreError>;

    async fn list_assets(&mut self) -> Result<Vec<Asset>, StoreError>;

    /// Insert a new asset row. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn insert_asset(&mut self, asset: &Asset) -> Result<(), StoreError>;

    /// Overwrite the quantity columns of an existing asset.
    async fn save_asset(&mut self, asset: &Asset) -> Result<(), StoreError>;

    async fn waybill_exists(&mut self, id: &WaybillId) -> Result<bool, StoreError>;

    async fn load_waybill(&mut self, id: &WaybillId) -> Result<Option<Waybill>, StoreError>;

    async fn insert_waybill(&mut self, waybill: &Waybill) -> Result<(), StoreError>;

    async fn save_waybill(&mut self, waybill: &Waybill) -> Result<(), StoreError>;

    async fn delete_waybill(&mut self, id: &WaybillId) -> Result<(), StoreError>;

    async fn append_movement(&mut self, entry: &MovementEntry) -> Result<(), StoreError>;

    /// Remove movements recorded for `reference_id` with one of `kinds`.
    /// Returns the number of rows removed.
    async fn delete_movements(
        &mut self,
        reference_id: &str,
        kinds: &[ReferenceType],
    ) -> Result<u64, StoreError>;

    /// Movements at `site`, oldest first.
    async fn site_movements(&mut self, site: &SiteId) -> Result<Vec<MovementEntry>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens units of work.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        (**self).begin().await
    }
}
