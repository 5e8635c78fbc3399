//! Inventory domain module: asset quantity bookkeeping.
//!
//! This crate contains the rules that keep an asset's quantities consistent
//! (total, reserved, per-site, damaged, missing, available), implemented purely
//! as deterministic domain logic (no IO, no storage).

pub mod asset;
pub mod condition;
pub mod movement;
pub mod site_stock;

pub use asset::{Asset, MAX_QUANTITY, StockLevels, recompute_available};
pub use condition::{ItemCondition, ReturnBreakdown};
pub use movement::{MovementDirection, MovementEntry, ReferenceType};
pub use site_stock::SiteQuantities;
