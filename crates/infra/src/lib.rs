//! Infrastructure layer: persistence, id allocation, the ledger executor and
//! configuration.

pub mod allocator;
pub mod config;
pub mod ledger;
pub mod store;


pub use allocator::{DEFAULT_MAX_ATTEMPTS, IdAllocator};
pub use config::{ConfigError, LedgerConfig};
pub use ledger::{LedgerError, OperationResult, ReconciliationReport, WaybillLedger};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTx, SqliteLedgerStore, StoreError};
