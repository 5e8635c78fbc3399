//! Sequential document id allocation.
//!
//! Ids are `PREFIX + zero-padded counter` (`WB001`, `RB014`, ...). The
//! existence check runs through the caller's unit of work, so the check and
//! the subsequent insert commit (or roll back) together.

use tracing::debug;

use siteledger_waybills::{WaybillId, WaybillPrefix};

use crate::ledger::LedgerError;
use crate::store::LedgerTx;

/// Attempt cap used unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// Bounded sequential allocator for waybill ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    max_attempts: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl IdAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return the lowest free id for `prefix`, counting from 1.
    ///
    /// Fails with [`LedgerError::AllocatorExhausted`] once `max_attempts`
    /// candidates are all taken. Retrying outside the unit of work cannot help.
    pub async fn allocate(
        &self,
        tx: &mut dyn LedgerTx,
        prefix: WaybillPrefix,
    ) -> Result<WaybillId, LedgerError> {
        for counter in 1..=self.max_attempts {
            let candidate = WaybillId::sequential(prefix, counter);
            if !tx.waybill_exists(&candidate).await? {
                debug!(id = %candidate, attempts = counter, "allocated waybill id");
                return Ok(candidate);
            }
        }

        Err(LedgerError::AllocatorExhausted {
            prefix: prefix.to_string(),
            attempts: self.max_attempts,
        })
    }
}
