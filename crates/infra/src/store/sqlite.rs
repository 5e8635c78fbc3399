//! SQLite-backed ledger store.
//!
//! One local database file holds the `assets`, `waybills` and
//! `site_transactions` tables. Each unit of work is one `sqlx` transaction
//! opened with `BEGIN IMMEDIATE`, so concurrent units queue on the write lock
//! (up to the busy timeout) instead of failing when they upgrade from reading
//! to writing.
//!
//! JSON columns (`assets.site_quantities`, `waybills.items`) and RFC 3339
//! timestamps are mapped to typed records here and nowhere else.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

use siteledger_core::{AssetId, MovementId, SiteId};
use siteledger_inventory::{
    Asset, ItemCondition, MovementDirection, MovementEntry, ReferenceType, SiteQuantities,
    StockLevels,
};
use siteledger_waybills::{LineItem, Waybill, WaybillDetails, WaybillId, WaybillStatus, WaybillType};

use super::r#trait::{LedgerStore, LedgerTx, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id                 TEXT PRIMARY KEY,
        name               TEXT NOT NULL,
        unit               TEXT NOT NULL,
        quantity           INTEGER NOT NULL CHECK (quantity >= 0),
        reserved_quantity  INTEGER NOT NULL DEFAULT 0 CHECK (reserved_quantity >= 0),
        damaged_count      INTEGER NOT NULL DEFAULT 0 CHECK (damaged_count >= 0),
        missing_count      INTEGER NOT NULL DEFAULT 0 CHECK (missing_count >= 0),
        site_quantities    TEXT NOT NULL DEFAULT '{}',
        available_quantity INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS waybills (
        id                   TEXT PRIMARY KEY,
        type                 TEXT NOT NULL,
        site_id              TEXT NOT NULL,
        return_to_site_id    TEXT NULL,
        driver_name          TEXT NOT NULL,
        vehicle              TEXT NOT NULL,
        issue_date           TEXT NOT NULL,
        expected_return_date TEXT NULL,
        purpose              TEXT NOT NULL,
        status               TEXT NOT NULL,
        items                TEXT NOT NULL,
        sent_to_site_date    TEXT NULL,
        created_at           TEXT NOT NULL,
        updated_at           TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS site_transactions (
        id             TEXT PRIMARY KEY,
        site_id        TEXT NOT NULL,
        asset_id       TEXT NOT NULL,
        asset_name     TEXT NOT NULL,
        quantity       INTEGER NOT NULL,
        type           TEXT NOT NULL,
        reference_id   TEXT NOT NULL,
        reference_type TEXT NOT NULL,
        condition      TEXT NULL,
        created_at     TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS site_transactions_site ON site_transactions (site_id, created_at)",
    "CREATE INDEX IF NOT EXISTS site_transactions_reference ON site_transactions (reference_id)",
];

/// SQLite ledger store.
///
/// `SqlitePool` is `Send + Sync` and cheap to clone; so is this handle.
#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Open (creating if needed) the database file at `path` and ensure the schema.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!("failed to create database directory {parent:?}: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database (tests/dev). Pinned to a single connection
    /// because every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and ensure the schema.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl LedgerTx for SqliteTx {
    async fn load_asset(&mut self, id: AssetId) -> Result<Option<Asset>, StoreError> {
        let row = sqlx::query("SELECT * FROM assets WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_asset", e))?;

        row.map(|r| row_to_asset(&r)).transpose()
    }

    async fn list_assets(&mut self) -> Result<Vec<Asset>, StoreError> {
        let rows = sqlx::query("SELECT * FROM assets ORDER BY id ASC")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_assets", e))?;

        rows.iter().map(row_to_asset).collect()
    }

    async fn insert_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        let sites = to_json(asset.site_quantities())?;
        sqlx::query(
            r#"
            INSERT INTO assets (
                id, name, unit, quantity, reserved_quantity, damaged_count,
                missing_count, site_quantities, available_quantity
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(asset.id_typed().to_string())
        .bind(asset.name())
        .bind(asset.unit())
        .bind(asset.quantity())
        .bind(asset.reserved_quantity())
        .bind(asset.damaged_count())
        .bind(asset.missing_count())
        .bind(sites)
        .bind(asset.available_quantity())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error("assets", asset.id_typed().to_string(), e))?;
        Ok(())
    }

    async fn save_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        let sites = to_json(asset.site_quantities())?;
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET quantity = ?2,
                reserved_quantity = ?3,
                damaged_count = ?4,
                missing_count = ?5,
                site_quantities = ?6,
                available_quantity = ?7
            WHERE id = ?1
            "#,
        )
        .bind(asset.id_typed().to_string())
        .bind(asset.quantity())
        .bind(asset.reserved_quantity())
        .bind(asset.damaged_count())
        .bind(asset.missing_count())
        .bind(sites)
        .bind(asset.available_quantity())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_asset", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing {
                table: "assets",
                id: asset.id_typed().to_string(),
            });
        }
        Ok(())
    }

    async fn waybill_exists(&mut self, id: &WaybillId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM waybills WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("waybill_exists", e))?;
        Ok(row.is_some())
    }

    async fn load_waybill(&mut self, id: &WaybillId) -> Result<Option<Waybill>, StoreError> {
        let row = sqlx::query("SELECT * FROM waybills WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_waybill", e))?;

        row.map(|r| row_to_waybill(&r)).transpose()
    }

    async fn insert_waybill(&mut self, waybill: &Waybill) -> Result<(), StoreError> {
        let items = to_json(waybill.items())?;
        let d = waybill.details();
        sqlx::query(
            r#"
            INSERT INTO waybills (
                id, type, site_id, return_to_site_id, driver_name, vehicle,
                issue_date, expected_return_date, purpose, status, items,
                sent_to_site_date, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(waybill.id_typed().as_str())
        .bind(waybill.kind().as_str())
        .bind(d.site_id.as_str())
        .bind(d.return_to_site_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(&d.driver_name)
        .bind(&d.vehicle)
        .bind(d.issue_date.to_rfc3339())
        .bind(d.expected_return_date.map(|t| t.to_rfc3339()))
        .bind(&d.purpose)
        .bind(waybill.status().as_str())
        .bind(items)
        .bind(waybill.sent_to_site_date().map(|t| t.to_rfc3339()))
        .bind(waybill.created_at().to_rfc3339())
        .bind(waybill.updated_at().to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error("waybills", waybill.id_typed().to_string(), e))?;
        Ok(())
    }

    async fn save_waybill(&mut self, waybill: &Waybill) -> Result<(), StoreError> {
        let items = to_json(waybill.items())?;
        let d = waybill.details();
        let result = sqlx::query(
            r#"
            UPDATE waybills
            SET site_id = ?2,
                return_to_site_id = ?3,
                driver_name = ?4,
                vehicle = ?5,
                issue_date = ?6,
                expected_return_date = ?7,
                purpose = ?8,
                status = ?9,
                items = ?10,
                sent_to_site_date = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(waybill.id_typed().as_str())
        .bind(d.site_id.as_str())
        .bind(d.return_to_site_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(&d.driver_name)
        .bind(&d.vehicle)
        .bind(d.issue_date.to_rfc3339())
        .bind(d.expected_return_date.map(|t| t.to_rfc3339()))
        .bind(&d.purpose)
        .bind(waybill.status().as_str())
        .bind(items)
        .bind(waybill.sent_to_site_date().map(|t| t.to_rfc3339()))
        .bind(waybill.updated_at().to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_waybill", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing {
                table: "waybills",
                id: waybill.id_typed().to_string(),
            });
        }
        Ok(())
    }

    async fn delete_waybill(&mut self, id: &WaybillId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM waybills WHERE id = ?1")
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_waybill", e))?;
        Ok(())
    }

    async fn append_movement(&mut self, entry: &MovementEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO site_transactions (
                id, site_id, asset_id, asset_name, quantity, type,
                reference_id, reference_type, condition, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.site_id.as_str())
        .bind(entry.asset_id.to_string())
        .bind(&entry.asset_name)
        .bind(entry.quantity)
        .bind(entry.direction.as_str())
        .bind(&entry.reference_id)
        .bind(entry.reference_type.as_str())
        .bind(entry.condition.map(|c| c.as_str()))
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error("site_transactions", entry.id.to_string(), e))?;
        Ok(())
    }

    async fn delete_movements(
        &mut self,
        reference_id: &str,
        kinds: &[ReferenceType],
    ) -> Result<u64, StoreError> {
        let mut removed = 0;
        for kind in kinds {
            let result = sqlx::query(
                "DELETE FROM site_transactions WHERE reference_id = ?1 AND reference_type = ?2",
            )
            .bind(reference_id)
            .bind(kind.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_movements", e))?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    async fn site_movements(&mut self, site: &SiteId) -> Result<Vec<MovementEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM site_transactions WHERE site_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(site.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("site_movements", e))?;

        rows.iter().map(row_to_movement).collect()
    }

    #[instrument(skip(self), err)]
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(skip(self), err)]
    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map an `assets` row into an `Asset`.
fn row_to_asset(row: &SqliteRow) -> Result<Asset, StoreError> {
    let id_str: String = get(row, "assets", "id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        table: "assets",
        id: id_str.clone(),
        reason,
    };

    let id = id_str
        .parse::<AssetId>()
        .map_err(|e| corrupt(e.to_string()))?;

    let sites_json: String = get(row, "assets", "site_quantities")?;
    let site_quantities: SiteQuantities = serde_json::from_str(&sites_json)
        .map_err(|e| corrupt(format!("invalid site_quantities JSON: {e}")))?;

    let stock = StockLevels {
        quantity: get(row, "assets", "quantity")?,
        reserved_quantity: get(row, "assets", "reserved_quantity")?,
        damaged_count: get(row, "assets", "damaged_count")?,
        missing_count: get(row, "assets", "missing_count")?,
        site_quantities,
    };

    Ok(Asset::rehydrate(
        id,
        get(row, "assets", "name")?,
        get(row, "assets", "unit")?,
        stock,
        get(row, "assets", "available_quantity")?,
    ))
}

/// Map a `waybills` row into a `Waybill`.
fn row_to_waybill(row: &SqliteRow) -> Result<Waybill, StoreError> {
    let id_str: String = get(row, "waybills", "id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        table: "waybills",
        id: id_str.clone(),
        reason,
    };

    let id = WaybillId::new(id_str.clone()).map_err(|e| corrupt(e.to_string()))?;
    let kind: WaybillType = get::<String>(row, "waybills", "type")?
        .parse()
        .map_err(|e: siteledger_core::DomainError| corrupt(e.to_string()))?;
    let status: WaybillStatus = get::<String>(row, "waybills", "status")?
        .parse()
        .map_err(|e: siteledger_core::DomainError| corrupt(e.to_string()))?;

    let items_json: String = get(row, "waybills", "items")?;
    let items: Vec<LineItem> = serde_json::from_str(&items_json)
        .map_err(|e| corrupt(format!("invalid items JSON: {e}")))?;

    let site = |column: &str, value: String| {
        SiteId::new(value).map_err(|e| corrupt(format!("{column}: {e}")))
    };

    let details = WaybillDetails {
        site_id: site("site_id", get(row, "waybills", "site_id")?)?,
        return_to_site_id: get::<Option<String>>(row, "waybills", "return_to_site_id")?
            .map(|s| site("return_to_site_id", s))
            .transpose()?,
        driver_name: get(row, "waybills", "driver_name")?,
        vehicle: get(row, "waybills", "vehicle")?,
        issue_date: parse_ts("waybills", &id_str, get(row, "waybills", "issue_date")?)?,
        expected_return_date: get::<Option<String>>(row, "waybills", "expected_return_date")?
            .map(|s| parse_ts("waybills", &id_str, s))
            .transpose()?,
        purpose: get(row, "waybills", "purpose")?,
    };

    let sent_to_site_date = get::<Option<String>>(row, "waybills", "sent_to_site_date")?
        .map(|s| parse_ts("waybills", &id_str, s))
        .transpose()?;

    Ok(Waybill::rehydrate(
        id,
        kind,
        details,
        status,
        items,
        sent_to_site_date,
        parse_ts("waybills", &id_str, get(row, "waybills", "created_at")?)?,
        parse_ts("waybills", &id_str, get(row, "waybills", "updated_at")?)?,
    ))
}

/// Map a `site_transactions` row into a `MovementEntry`.
fn row_to_movement(row: &SqliteRow) -> Result<MovementEntry, StoreError> {
    let id_str: String = get(row, "site_transactions", "id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        table: "site_transactions",
        id: id_str.clone(),
        reason,
    };

    let condition = get::<Option<String>>(row, "site_transactions", "condition")?
        .map(|c| c.parse::<ItemCondition>())
        .transpose()
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(MovementEntry {
        id: id_str
            .parse::<MovementId>()
            .map_err(|e| corrupt(e.to_string()))?,
        site_id: SiteId::new(get::<String>(row, "site_transactions", "site_id")?)
            .map_err(|e| corrupt(e.to_string()))?,
        asset_id: get::<String>(row, "site_transactions", "asset_id")?
            .parse::<AssetId>()
            .map_err(|e| corrupt(e.to_string()))?,
        asset_name: get(row, "site_transactions", "asset_name")?,
        quantity: get(row, "site_transactions", "quantity")?,
        direction: get::<String>(row, "site_transactions", "type")?
            .parse::<MovementDirection>()
            .map_err(|e| corrupt(e.to_string()))?,
        reference_id: get(row, "site_transactions", "reference_id")?,
        reference_type: get::<String>(row, "site_transactions", "reference_type")?
            .parse::<ReferenceType>()
            .map_err(|e| corrupt(e.to_string()))?,
        condition,
        created_at: parse_ts(
            "site_transactions",
            &id_str,
            get(row, "site_transactions", "created_at")?,
        )?,
    })
}

fn get<T>(row: &SqliteRow, table: &'static str, column: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Database(format!("failed to read {table}.{column}: {e}")))
}

fn parse_ts(table: &'static str, id: &str, value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            id: id.to_string(),
            reason: format!("invalid timestamp '{value}': {e}"),
        })
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn map_insert_error(table: &'static str, id: String, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate { table, id };
        }
    }
    map_sqlx_error("insert", err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Database(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Database(format!("timed out waiting for a connection in {}", operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteledger_inventory::ReturnBreakdown;

    fn site(id: &str) -> SiteId {
        SiteId::new(id).unwrap()
    }

    fn details() -> WaybillDetails {
        WaybillDetails {
            site_id: site("S1"),
            return_to_site_id: Some(site("YARD")),
            driver_name: "A. Boateng".into(),
            vehicle: "Flatbed 7".into(),
            issue_date: Utc::now(),
            expected_return_date: None,
            purpose: "Formwork".into(),
        }
    }

    #[tokio::test]
    async fn asset_row_round_trips_site_quantities() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let mut asset = Asset::register(AssetId::new(), "Prop", "pcs", 30).unwrap();
        asset.reserve(10).unwrap();
        asset.deploy_to_site(&site("S1"), 10).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_asset(&asset).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let loaded = tx.load_asset(asset.id_typed()).await.unwrap().unwrap();
        assert_eq!(loaded, asset);
        assert_eq!(loaded.site_quantity(&site("S1")), 10);
    }

    #[tokio::test]
    async fn waybill_row_round_trips_items_and_dates() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let a = AssetId::new();
        let mut wb = Waybill::new(
            WaybillId::new("WB001").unwrap(),
            WaybillType::Waybill,
            details(),
            vec![LineItem::new(a, "Prop", 4)],
            Utc::now(),
        )
        .unwrap();
        wb.mark_sent_to_site(Utc::now()).unwrap();
        wb.record_returns(
            &std::collections::BTreeMap::from([(a, ReturnBreakdown::new(1, 1, 0))]),
            Utc::now(),
        )
        .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_waybill(&wb).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let loaded = tx.load_waybill(wb.id_typed()).await.unwrap().unwrap();
        assert_eq!(loaded.items(), wb.items());
        assert_eq!(loaded.status(), WaybillStatus::PartialReturned);
        assert_eq!(loaded.details().return_to_site_id, Some(site("YARD")));
        assert!(loaded.sent_to_site_date().is_some());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let asset = Asset::register(AssetId::new(), "Prop", "pcs", 30).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_asset(&asset).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.load_asset(asset.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_waybill_insert_maps_to_duplicate() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let wb = Waybill::new(
            WaybillId::new("WB001").unwrap(),
            WaybillType::Waybill,
            details(),
            vec![LineItem::new(AssetId::new(), "Prop", 4)],
            Utc::now(),
        )
        .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_waybill(&wb).await.unwrap();
        let err = tx.insert_waybill(&wb).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { table: "waybills", .. }));
    }

    #[tokio::test]
    async fn movements_are_filtered_by_site_and_deleted_by_reference() {
        let store = SqliteLedgerStore::in_memory().await.unwrap();
        let a = AssetId::new();
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        tx.append_movement(&MovementEntry::inbound(site("S1"), a, "Prop", 4, "WB001", ReferenceType::Waybill, now))
            .await
            .unwrap();
        tx.append_movement(&MovementEntry::inbound(site("S2"), a, "Prop", 2, "WB002", ReferenceType::Waybill, now))
            .await
            .unwrap();
        tx.append_movement(&MovementEntry::outbound(
            site("S1"),
            a,
            "Prop",
            1,
            "RB001",
            ReferenceType::ReturnWaybill,
            Some(ItemCondition::Missing),
            now,
        ))
        .await
        .unwrap();

        assert_eq!(tx.site_movements(&site("S1")).await.unwrap().len(), 2);
        let removed = tx
            .delete_movements("WB001", &[ReferenceType::Waybill, ReferenceType::WaybillAdjustment])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let left = tx.site_movements(&site("S1")).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].condition, Some(ItemCondition::Missing));
        assert_eq!(left[0].direction, MovementDirection::Out);
    }
}
