//! Human-readable waybill identifiers (`WB001`, `RB014`, ...).

use serde::{Deserialize, Serialize};

use siteledger_core::DomainError;

/// Minimum number of digits in a sequential id.
const COUNTER_WIDTH: usize = 3;

/// Identifier prefix, chosen by waybill type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaybillPrefix {
    /// Outbound loan to a site.
    Waybill,
    /// Return from a site.
    Return,
}

impl WaybillPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaybillPrefix::Waybill => "WB",
            WaybillPrefix::Return => "RB",
        }
    }
}

impl core::fmt::Display for WaybillPrefix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waybill identifier. Caller-supplied ids are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaybillId(String);

impl WaybillId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::invalid_id("WaybillId: empty"));
        }
        Ok(Self(id))
    }

    /// `PREFIX` followed by the counter, zero-padded to three digits.
    pub fn sequential(prefix: WaybillPrefix, counter: u32) -> Self {
        Self(format!("{}{:0width$}", prefix.as_str(), counter, width = COUNTER_WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for WaybillId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for WaybillId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_zero_padded() {
        assert_eq!(WaybillId::sequential(WaybillPrefix::Waybill, 1).as_str(), "WB001");
        assert_eq!(WaybillId::sequential(WaybillPrefix::Return, 42).as_str(), "RB042");
        assert_eq!(WaybillId::sequential(WaybillPrefix::Waybill, 1000).as_str(), "WB1000");
    }

    #[test]
    fn blank_id_is_rejected() {
        assert!(WaybillId::new("").is_err());
        assert!("WB007".parse::<WaybillId>().is_ok());
    }
}
