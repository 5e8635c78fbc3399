use serde::{Deserialize, Serialize};

use siteledger_core::{AssetId, DomainError, DomainResult, Entity, SiteId};

use crate::condition::ReturnBreakdown;
use crate::site_stock::SiteQuantities;

/// Largest unit count accepted for an asset or a single movement.
///
/// Keeps every sum of quantities the ledger computes well inside `i64`.
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Quantity bookkeeping of one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    /// Total units owned (office + everywhere).
    pub quantity: i64,
    /// Units committed to waybills that have not been returned yet, wherever they are.
    pub reserved_quantity: i64,
    pub damaged_count: i64,
    pub missing_count: i64,
    /// Units physically present per site. Informational: already covered by
    /// `reserved_quantity`, so never subtracted from availability.
    pub site_quantities: SiteQuantities,
}

/// Units free to be committed to a new waybill.
///
/// `available = quantity - reserved - damaged - missing`
pub fn recompute_available(levels: &StockLevels) -> i64 {
    levels
        .quantity
        .saturating_sub(levels.reserved_quantity)
        .saturating_sub(levels.damaged_count)
        .saturating_sub(levels.missing_count)
}

/// Asset record: identity, description and quantity state.
///
/// The stored `available_quantity` is kept equal to [`recompute_available`]
/// by every mutator. A record loaded from storage may disagree (drift from an
/// interrupted write); [`Asset::is_consistent`] detects that and
/// [`Asset::recompute_available`] heals it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    id: AssetId,
    name: String,
    unit: String,
    stock: StockLevels,
    available_quantity: i64,
}

impl Asset {
    /// Register a new asset with `quantity` units on hand and nothing committed.
    pub fn register(
        id: AssetId,
        name: impl Into<String>,
        unit: impl Into<String>,
        quantity: i64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("asset name cannot be empty"));
        }
        if quantity < 0 {
            return Err(DomainError::validation("asset quantity cannot be negative"));
        }
        if quantity > MAX_QUANTITY {
            return Err(DomainError::validation(format!(
                "asset quantity cannot exceed {MAX_QUANTITY}"
            )));
        }

        let stock = StockLevels {
            quantity,
            ..StockLevels::default()
        };
        let available_quantity = recompute_available(&stock);
        Ok(Self {
            id,
            name,
            unit: unit.into(),
            stock,
            available_quantity,
        })
    }

    /// Rebuild an asset from persisted fields, keeping the stored available
    /// quantity as-is (it may have drifted).
    pub fn rehydrate(
        id: AssetId,
        name: String,
        unit: String,
        stock: StockLevels,
        stored_available: i64,
    ) -> Self {
        Self {
            id,
            name,
            unit,
            stock,
            available_quantity: stored_available,
        }
    }

    pub fn id_typed(&self) -> AssetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn stock(&self) -> &StockLevels {
        &self.stock
    }

    pub fn quantity(&self) -> i64 {
        self.stock.quantity
    }

    pub fn reserved_quantity(&self) -> i64 {
        self.stock.reserved_quantity
    }

    pub fn damaged_count(&self) -> i64 {
        self.stock.damaged_count
    }

    pub fn missing_count(&self) -> i64 {
        self.stock.missing_count
    }

    pub fn site_quantities(&self) -> &SiteQuantities {
        &self.stock.site_quantities
    }

    pub fn site_quantity(&self, site: &SiteId) -> i64 {
        self.stock.site_quantities.get(site)
    }

    /// Stored available quantity.
    pub fn available_quantity(&self) -> i64 {
        self.available_quantity
    }

    /// Whether the stored available quantity matches the formula.
    pub fn is_consistent(&self) -> bool {
        self.available_quantity == recompute_available(&self.stock)
    }

    /// Re-derive the stored available quantity. Returns `true` if it changed.
    pub fn recompute_available(&mut self) -> bool {
        let derived = recompute_available(&self.stock);
        let changed = derived != self.available_quantity;
        self.available_quantity = derived;
        changed
    }

    /// Drop zero-valued site entries left behind by older writers.
    pub fn prune_sites(&mut self) -> bool {
        self.stock.site_quantities.prune()
    }

    /// Commit `quantity` units to a waybill.
    ///
    /// Fails without touching the record if availability would go negative.
    pub fn reserve(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        let mut next = self.stock.clone();
        let reserved = next.reserved_quantity.checked_add(quantity);
        next.reserved_quantity = reserved.unwrap_or(i64::MAX);
        if reserved.is_none() || recompute_available(&next) < 0 {
            return Err(DomainError::insufficient(
                &self.name,
                quantity,
                recompute_available(&self.stock),
            ));
        }
        self.stock = next;
        self.recompute_available();
        Ok(())
    }

    /// Release a commitment, flooring the reservation at zero.
    pub fn release(&mut self, quantity: i64) {
        if quantity <= 0 {
            return;
        }
        self.stock.reserved_quantity = (self.stock.reserved_quantity - quantity).max(0);
        self.recompute_available();
    }

    /// Record `quantity` units arriving at `site`. The reservation is untouched.
    pub fn deploy_to_site(&mut self, site: &SiteId, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        self.stock.site_quantities.add(site, quantity)?;
        self.recompute_available();
        Ok(())
    }

    /// Take units off `site` (floored at zero). Returns the units removed.
    pub fn withdraw_from_site(&mut self, site: &SiteId, quantity: i64) -> i64 {
        let removed = self.stock.site_quantities.subtract(site, quantity);
        self.recompute_available();
        removed
    }

    /// Fail unless `site` holds at least `quantity` units.
    pub fn ensure_site_stock(&self, site: &SiteId, quantity: i64) -> DomainResult<()> {
        let at_site = self.site_quantity(site);
        if quantity > at_site {
            return Err(DomainError::insufficient(
                format!("{} at site {}", self.name, site),
                quantity,
                at_site,
            ));
        }
        Ok(())
    }

    /// Apply a return from `site`.
    ///
    /// Every returned unit leaves the site and its reservation; damaged and
    /// missing units are written off permanently.
    pub fn settle_return(&mut self, site: &SiteId, breakdown: &ReturnBreakdown) -> DomainResult<()> {
        breakdown.validate()?;
        let total = breakdown.total();
        ensure_positive(total)?;
        self.ensure_site_stock(site, total)?;

        self.stock.reserved_quantity = (self.stock.reserved_quantity - total).max(0);
        self.stock.site_quantities.subtract(site, total);
        self.stock.damaged_count = self.stock.damaged_count.saturating_add(breakdown.damaged);
        self.stock.missing_count = self.stock.missing_count.saturating_add(breakdown.missing);
        self.recompute_available();
        Ok(())
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    if quantity > MAX_QUANTITY {
        return Err(DomainError::validation(format!(
            "quantity cannot exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

impl Entity for Asset {
    type Id = AssetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn site(id: &str) -> SiteId {
        SiteId::new(id).unwrap()
    }

    fn asset(quantity: i64) -> Asset {
        Asset::register(AssetId::new(), "Scaffold clamp", "pcs", quantity).unwrap()
    }

    #[test]
    fn register_starts_fully_available() {
        let a = asset(100);
        assert_eq!(a.available_quantity(), 100);
        assert!(a.is_consistent());
    }

    #[test]
    fn register_rejects_blank_name_and_negative_quantity() {
        assert!(Asset::register(AssetId::new(), " ", "pcs", 1).is_err());
        assert!(Asset::register(AssetId::new(), "Drill", "pcs", -1).is_err());
    }

    #[test]
    fn reserve_reduces_available() {
        let mut a = asset(10);
        a.reserve(4).unwrap();
        assert_eq!(a.reserved_quantity(), 4);
        assert_eq!(a.available_quantity(), 6);
    }

    #[test]
    fn reserve_beyond_available_leaves_record_unchanged() {
        let mut a = asset(10);
        a.reserve(8).unwrap();
        let before = a.clone();

        let err = a.reserve(3).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientQuantity {
                asset: "Scaffold clamp".to_string(),
                requested: 3,
                available: 2,
            }
        );
        assert_eq!(a, before);
    }

    #[test]
    fn deploy_keeps_reservation_and_availability() {
        let mut a = asset(10);
        a.reserve(5).unwrap();
        a.deploy_to_site(&site("S1"), 5).unwrap();
        assert_eq!(a.reserved_quantity(), 5);
        assert_eq!(a.site_quantity(&site("S1")), 5);
        assert_eq!(a.available_quantity(), 5);
    }

    #[test]
    fn release_floors_at_zero() {
        let mut a = asset(10);
        a.reserve(2).unwrap();
        a.release(5);
        assert_eq!(a.reserved_quantity(), 0);
        assert_eq!(a.available_quantity(), 10);
    }

    #[test]
    fn settle_return_matches_worked_example() {
        let mut a = asset(100);
        a.reserve(20).unwrap();
        a.deploy_to_site(&site("S1"), 20).unwrap();

        a.settle_return(&site("S1"), &ReturnBreakdown::new(8, 3, 1)).unwrap();

        assert_eq!(a.reserved_quantity(), 8);
        assert_eq!(a.site_quantity(&site("S1")), 8);
        assert_eq!(a.damaged_count(), 3);
        assert_eq!(a.missing_count(), 1);
        assert_eq!(a.available_quantity(), 88);
    }

    #[test]
    fn settle_return_rejects_more_than_site_holds() {
        let mut a = asset(100);
        a.reserve(5).unwrap();
        a.deploy_to_site(&site("S1"), 5).unwrap();
        let before = a.clone();

        let err = a.settle_return(&site("S1"), &ReturnBreakdown::new(6, 0, 0)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientQuantity { .. }));
        assert_eq!(a, before);
    }

    #[test]
    fn full_return_empties_site_entry() {
        let mut a = asset(10);
        a.reserve(4).unwrap();
        a.deploy_to_site(&site("S1"), 4).unwrap();
        a.settle_return(&site("S1"), &ReturnBreakdown::new(4, 0, 0)).unwrap();
        assert!(a.site_quantities().is_empty());
        assert_eq!(a.available_quantity(), 10);
    }

    #[test]
    fn oversized_quantities_are_rejected_without_overflow() {
        assert!(Asset::register(AssetId::new(), "Drill", "pcs", MAX_QUANTITY + 1).is_err());

        let mut a = asset(10);
        a.reserve(1).unwrap();
        a.deploy_to_site(&site("S1"), 1).unwrap();
        let before = a.clone();

        assert!(a.reserve(i64::MAX).is_err());
        assert!(a.deploy_to_site(&site("S1"), i64::MAX).is_err());
        assert!(a.settle_return(&site("S1"), &ReturnBreakdown::new(i64::MAX, 1, 0)).is_err());
        assert_eq!(a, before);
    }

    #[test]
    fn reserve_on_saturated_record_reports_insufficient() {
        let stock = StockLevels {
            quantity: 10,
            reserved_quantity: i64::MAX - 1,
            ..StockLevels::default()
        };
        let mut a = Asset::rehydrate(AssetId::new(), "Prop".into(), "pcs".into(), stock, 0);
        let err = a.reserve(5).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientQuantity { .. }));
    }

    #[test]
    fn rehydrated_drift_is_detected_and_healed() {
        let stock = StockLevels {
            quantity: 50,
            reserved_quantity: 10,
            damaged_count: 2,
            missing_count: 1,
            site_quantities: SiteQuantities::new(),
        };
        let mut a = Asset::rehydrate(AssetId::new(), "Generator".into(), "pcs".into(), stock, 40);
        assert!(!a.is_consistent());
        assert!(a.recompute_available());
        assert_eq!(a.available_quantity(), 37);
        assert!(!a.recompute_available());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(i64),
        Release(i64),
        Deploy(i64),
        Return(i64, i64, i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..50).prop_map(Op::Reserve),
            (1i64..50).prop_map(Op::Release),
            (1i64..50).prop_map(Op::Deploy),
            (0i64..10, 0i64..10, 0i64..10).prop_map(|(g, d, m)| Op::Return(g, d, m)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of mutations is attempted, the stored
        /// available quantity always equals the formula and never goes negative
        /// through a reservation.
        #[test]
        fn available_always_matches_formula(
            quantity in 0i64..500,
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let mut a = asset(quantity);
            let s1 = site("S1");
            for op in ops {
                let before_available = a.available_quantity();
                match op {
                    Op::Reserve(q) => {
                        if a.reserve(q).is_err() {
                            prop_assert_eq!(a.available_quantity(), before_available);
                        }
                    }
                    Op::Release(q) => a.release(q),
                    Op::Deploy(q) => { let _ = a.deploy_to_site(&s1, q); }
                    Op::Return(g, d, m) => { let _ = a.settle_return(&s1, &ReturnBreakdown::new(g, d, m)); }
                }
                prop_assert!(a.is_consistent());
                prop_assert!(a.reserved_quantity() >= 0);
                prop_assert!(a.site_quantities().iter().all(|(_, q)| q > 0));
            }
        }

        /// Property: dispatching never moves the reservation or availability.
        #[test]
        fn deploy_preserves_reservation(quantity in 1i64..500, deploy in 1i64..500) {
            let mut a = asset(quantity);
            let reserve = deploy.min(quantity);
            a.reserve(reserve).unwrap();
            let (reserved, available) = (a.reserved_quantity(), a.available_quantity());
            a.deploy_to_site(&site("S1"), reserve).unwrap();
            prop_assert_eq!(a.reserved_quantity(), reserved);
            prop_assert_eq!(a.available_quantity(), available);
        }
    }
}
