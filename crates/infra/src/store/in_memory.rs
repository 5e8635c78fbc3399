use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use siteledger_core::{AssetId, Entity, SiteId};
use siteledger_inventory::{Asset, MovementEntry, ReferenceType};
use siteledger_waybills::{Waybill, WaybillId};

use super::r#trait::{LedgerStore, LedgerTx, StoreError};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    assets: BTreeMap<AssetId, Asset>,
    waybills: BTreeMap<WaybillId, Waybill>,
    movements: Vec<MovementEntry>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A unit of work holds the store lock for its whole
/// lifetime (units are fully serialized) and edits a private copy that
/// replaces the committed state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn load_asset(&mut self, id: AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.working.assets.get(&id).cloned())
    }

    async fn list_assets(&mut self) -> Result<Vec<Asset>, StoreError> {
        Ok(self.working.assets.values().cloned().collect())
    }

    async fn insert_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        insert_row("assets", &mut self.working.assets, asset)
    }

    async fn save_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        replace_row("assets", &mut self.working.assets, asset)
    }

    async fn waybill_exists(&mut self, id: &WaybillId) -> Result<bool, StoreError> {
        Ok(self.working.waybills.contains_key(id))
    }

    async fn load_waybill(&mut self, id: &WaybillId) -> Result<Option<Waybill>, StoreError> {
        Ok(self.working.waybills.get(id).cloned())
    }

    async fn insert_waybill(&mut self, waybill: &Waybill) -> Result<(), StoreError> {
        insert_row("waybills", &mut self.working.waybills, waybill)
    }

    async fn save_waybill(&mut self, waybill: &Waybill) -> Result<(), StoreError> {
        replace_row("waybills", &mut self.working.waybills, waybill)
    }

    async fn delete_waybill(&mut self, id: &WaybillId) -> Result<(), StoreError> {
        self.working.waybills.remove(id);
        Ok(())
    }

    async fn append_movement(&mut self, entry: &MovementEntry) -> Result<(), StoreError> {
        self.working.movements.push(entry.clone());
        Ok(())
    }

    async fn delete_movements(
        &mut self,
        reference_id: &str,
        kinds: &[ReferenceType],
    ) -> Result<u64, StoreError> {
        let before = self.working.movements.len();
        self.working
            .movements
            .retain(|m| !(m.reference_id == reference_id && kinds.contains(&m.reference_type)));
        Ok((before - self.working.movements.len()) as u64)
    }

    async fn site_movements(&mut self, site: &SiteId) -> Result<Vec<MovementEntry>, StoreError> {
        Ok(self
            .working
            .movements
            .iter()
            .filter(|m| &m.site_id == site)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

fn insert_row<E>(
    table: &'static str,
    rows: &mut BTreeMap<E::Id, E>,
    row: &E,
) -> Result<(), StoreError>
where
    E: Entity + Clone,
    E::Id: Ord + core::fmt::Display,
{
    if rows.contains_key(row.id()) {
        return Err(StoreError::Duplicate {
            table,
            id: row.id().to_string(),
        });
    }
    rows.insert(row.id().clone(), row.clone());
    Ok(())
}

fn replace_row<E>(
    table: &'static str,
    rows: &mut BTreeMap<E::Id, E>,
    row: &E,
) -> Result<(), StoreError>
where
    E: Entity + Clone,
    E::Id: Ord + core::fmt::Display,
{
    match rows.get_mut(row.id()) {
        Some(existing) => {
            *existing = row.clone();
            Ok(())
        }
        None => Err(StoreError::Missing {
            table,
            id: row.id().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset::register(AssetId::new(), "Mixer", "pcs", 4).unwrap()
    }

    #[tokio::test]
    async fn uncommitted_unit_is_discarded() {
        let store = InMemoryLedgerStore::new();
        let a = asset();

        let mut tx = store.begin().await.unwrap();
        tx.insert_asset(&a).await.unwrap();
        assert!(tx.load_asset(a.id_typed()).await.unwrap().is_some());
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.load_asset(a.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_unit_is_visible_to_the_next() {
        let store = InMemoryLedgerStore::new();
        let a = asset();

        let mut tx = store.begin().await.unwrap();
        tx.insert_asset(&a).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.load_asset(a.id_typed()).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn duplicate_asset_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let a = asset();
        let mut tx = store.begin().await.unwrap();
        tx.insert_asset(&a).await.unwrap();
        assert!(matches!(
            tx.insert_asset(&a).await,
            Err(StoreError::Duplicate { table: "assets", .. })
        ));
    }
}
