//! Per-asset quantity differences between two versions of a waybill.

use std::collections::{BTreeMap, BTreeSet};

use siteledger_core::AssetId;

/// `new - old` for every asset appearing in either map; zero deltas are omitted.
pub fn quantity_deltas(
    old: &BTreeMap<AssetId, i64>,
    new: &BTreeMap<AssetId, i64>,
) -> BTreeMap<AssetId, i64> {
    let assets: BTreeSet<&AssetId> = old.keys().chain(new.keys()).collect();
    assets
        .into_iter()
        .filter_map(|asset| {
            let before = old.get(asset).copied().unwrap_or(0);
            let after = new.get(asset).copied().unwrap_or(0);
            let delta = after - before;
            (delta != 0).then_some((*asset, delta))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn added_removed_and_changed_assets_produce_deltas() {
        let (a, b, c) = (AssetId::new(), AssetId::new(), AssetId::new());
        let old = BTreeMap::from([(a, 5), (b, 3)]);
        let new = BTreeMap::from([(a, 7), (c, 2)]);

        let deltas = quantity_deltas(&old, &new);
        assert_eq!(deltas.get(&a), Some(&2));
        assert_eq!(deltas.get(&b), Some(&-3));
        assert_eq!(deltas.get(&c), Some(&2));
    }

    #[test]
    fn unchanged_assets_are_omitted() {
        let a = AssetId::new();
        let old = BTreeMap::from([(a, 5)]);
        assert!(quantity_deltas(&old, &old.clone()).is_empty());
    }

    proptest! {
        /// Property: applying the deltas to the old quantities yields the new ones.
        #[test]
        fn deltas_reconstruct_new_quantities(
            old_q in prop::collection::vec(0i64..100, 4),
            new_q in prop::collection::vec(0i64..100, 4)
        ) {
            let ids: Vec<AssetId> = (0..4).map(|_| AssetId::new()).collect();
            let old: BTreeMap<_, _> = ids.iter().copied().zip(old_q).filter(|(_, q)| *q > 0).collect();
            let new: BTreeMap<_, _> = ids.iter().copied().zip(new_q).filter(|(_, q)| *q > 0).collect();

            let deltas = quantity_deltas(&old, &new);
            for id in &ids {
                let before = old.get(id).copied().unwrap_or(0);
                let after = new.get(id).copied().unwrap_or(0);
                prop_assert_eq!(before + deltas.get(id).copied().unwrap_or(0), after);
            }
        }
    }
}
