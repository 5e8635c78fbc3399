//! Ledger operations.
//!
//! Every operation runs inside one unit of work obtained from a
//! [`LedgerStore`](crate::store::LedgerStore): it reads and validates asset
//! and waybill records, mutates them, appends movement entries and then
//! commits. Any failure rolls the whole unit back, so the available-quantity
//! invariant is never observable in a broken state.
//!
//! ```text
//! caller ─▶ WaybillLedger::op(cmd)
//!             ├─ store.begin()
//!             ├─ validate + mutate through &mut dyn LedgerTx
//!             └─ commit on Ok / rollback on Err
//! ```

mod commands;
mod error;
mod executor;
mod reconcile;
mod settlement;

pub use commands::{
    CreateReturnWaybill, CreateWaybill, DeleteWaybill, NewLineItem, ProcessReturn, RegisterAsset,
    SendToSite, UpdateWaybill,
};
pub use error::{LedgerError, OperationResult};
pub use executor::{SiteStockLine, WaybillLedger};
pub use reconcile::{AssetCorrection, ReconciliationReport};
