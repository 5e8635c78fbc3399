//! Ledger persistence boundary.
//!
//! The executor talks to storage only through a [`LedgerTx`] unit of work
//! opened by a [`LedgerStore`]. Everything done through one unit is committed
//! or rolled back together.

pub mod in_memory;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;
pub use r#trait::{LedgerStore, LedgerTx, StoreError};
