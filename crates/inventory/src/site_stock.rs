//! Per-site quantity map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use siteledger_core::{DomainError, DomainResult, SiteId, ValueObject};

/// Units of one asset physically present at each site.
///
/// Entries are strictly positive: a site whose quantity drops to zero is
/// removed from the map rather than kept as `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteQuantities(BTreeMap<SiteId, i64>);

impl ValueObject for SiteQuantities {}

impl SiteQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units at `site` (zero when the site holds none).
    pub fn get(&self, site: &SiteId) -> i64 {
        self.0.get(site).copied().unwrap_or(0)
    }

    /// Add units to a site. Fails, leaving the map unchanged, if the site
    /// total would overflow.
    pub fn add(&mut self, site: &SiteId, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Ok(());
        }
        let next = self.get(site).checked_add(quantity).ok_or_else(|| {
            DomainError::validation(format!("site {site} quantity overflows"))
        })?;
        self.0.insert(site.clone(), next);
        Ok(())
    }

    /// Remove units from a site, flooring at zero and dropping emptied entries.
    ///
    /// Returns the number of units actually removed.
    pub fn subtract(&mut self, site: &SiteId, quantity: i64) -> i64 {
        if quantity <= 0 {
            return 0;
        }
        let current = self.get(site);
        let removed = quantity.min(current);
        let remaining = current - removed;
        if remaining > 0 {
            self.0.insert(site.clone(), remaining);
        } else {
            self.0.remove(site);
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteId, i64)> {
        self.0.iter().map(|(site, qty)| (site, *qty))
    }

    /// Drop entries that are zero or negative.
    ///
    /// Returns `true` if anything was removed.
    pub fn prune(&mut self) -> bool {
        let before = self.0.len();
        self.0.retain(|_, qty| *qty > 0);
        self.0.len() != before
    }
}

impl FromIterator<(SiteId, i64)> for SiteQuantities {
    fn from_iter<T: IntoIterator<Item = (SiteId, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
