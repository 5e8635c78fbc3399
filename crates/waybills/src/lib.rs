//! Waybill domain module: loan/return documents and their lifecycle.
//!
//! A waybill authorises moving asset quantities from the office to a site
//! (`WB###`) or back (`RB###`). This crate holds the record, its line items and
//! the status state machine, as pure domain logic.

pub mod diff;
pub mod id;
pub mod returns;
pub mod waybill;

pub use diff::quantity_deltas;
pub use id::{WaybillId, WaybillPrefix};
pub use returns::{ReturnLine, group_return_lines};
pub use waybill::{LineItem, Waybill, WaybillDetails, WaybillStatus, WaybillType};
