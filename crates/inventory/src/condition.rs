//! Condition of returned units.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use siteledger_core::{DomainError, DomainResult, ValueObject};

use crate::asset::MAX_QUANTITY;

/// Condition recorded for returned units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCondition {
    Good,
    Damaged,
    Missing,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::Good => "good",
            ItemCondition::Damaged => "damaged",
            ItemCondition::Missing => "missing",
        }
    }
}

impl core::fmt::Display for ItemCondition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCondition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(ItemCondition::Good),
            "damaged" => Ok(ItemCondition::Damaged),
            "missing" => Ok(ItemCondition::Missing),
            other => Err(DomainError::validation(format!("unknown item condition '{other}'"))),
        }
    }
}

/// Split of a returned quantity by condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnBreakdown {
    pub good: i64,
    pub damaged: i64,
    pub missing: i64,
}

impl ValueObject for ReturnBreakdown {}

impl ReturnBreakdown {
    pub fn new(good: i64, damaged: i64, missing: i64) -> Self {
        Self {
            good,
            damaged,
            missing,
        }
    }

    /// Units across all conditions, saturating at `i64::MAX`.
    pub fn total(&self) -> i64 {
        self.good.saturating_add(self.damaged).saturating_add(self.missing)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Reject negative components and totals above [`MAX_QUANTITY`].
    pub fn validate(&self) -> DomainResult<()> {
        if self.good < 0 || self.damaged < 0 || self.missing < 0 {
            return Err(DomainError::validation(
                "return quantities cannot be negative",
            ));
        }
        if self.total() > MAX_QUANTITY {
            return Err(DomainError::validation(format!(
                "return quantity cannot exceed {MAX_QUANTITY}"
            )));
        }
        Ok(())
    }

    /// Componentwise sum, `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(ReturnBreakdown {
            good: self.good.checked_add(rhs.good)?,
            damaged: self.damaged.checked_add(rhs.damaged)?,
            missing: self.missing.checked_add(rhs.missing)?,
        })
    }

    /// Condition used to label a movement entry: damaged > missing > good.
    pub fn dominant_condition(&self) -> ItemCondition {
        if self.damaged > 0 {
            ItemCondition::Damaged
        } else if self.missing > 0 {
            ItemCondition::Missing
        } else {
            ItemCondition::Good
        }
    }
}

impl core::ops::Add for ReturnBreakdown {
    type Output = ReturnBreakdown;

    fn add(self, rhs: Self) -> Self::Output {
        ReturnBreakdown {
            good: self.good.saturating_add(rhs.good),
            damaged: self.damaged.saturating_add(rhs.damaged),
            missing: self.missing.saturating_add(rhs.missing),
        }
    }
}

impl core::ops::AddAssign for ReturnBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_condition_prefers_damaged_then_missing() {
        assert_eq!(ReturnBreakdown::new(8, 3, 1).dominant_condition(), ItemCondition::Damaged);
        assert_eq!(ReturnBreakdown::new(8, 0, 1).dominant_condition(), ItemCondition::Missing);
        assert_eq!(ReturnBreakdown::new(8, 0, 0).dominant_condition(), ItemCondition::Good);
    }

    #[test]
    fn negative_components_are_rejected() {
        assert!(ReturnBreakdown::new(1, -1, 0).validate().is_err());
        assert!(ReturnBreakdown::new(1, 0, 0).validate().is_ok());
    }

    #[test]
    fn add_assign_sums_componentwise() {
        let mut b = ReturnBreakdown::new(1, 2, 3);
        b += ReturnBreakdown::new(4, 0, 1);
        assert_eq!(b, ReturnBreakdown::new(5, 2, 4));
        assert_eq!(b.total(), 11);
    }

    #[test]
    fn oversized_breakdown_fails_validation() {
        let huge = ReturnBreakdown::new(i64::MAX, 1, 0);
        assert_eq!(huge.total(), i64::MAX);
        assert!(huge.validate().is_err());
        assert!(ReturnBreakdown::new(MAX_QUANTITY, 0, 0).validate().is_ok());
        assert!(ReturnBreakdown::new(MAX_QUANTITY, 1, 0).validate().is_err());
    }

    #[test]
    fn checked_add_reports_overflow() {
        let big = ReturnBreakdown::new(i64::MAX, 0, 0);
        assert_eq!(big.checked_add(ReturnBreakdown::new(1, 0, 0)), None);
        assert_eq!(
            ReturnBreakdown::new(1, 2, 3).checked_add(ReturnBreakdown::new(1, 0, 0)),
            Some(ReturnBreakdown::new(2, 2, 3))
        );
    }

    #[test]
    fn condition_parses_wire_names() {
        assert_eq!("damaged".parse::<ItemCondition>().unwrap(), ItemCondition::Damaged);
        assert!("broken".parse::<ItemCondition>().is_err());
    }
}
