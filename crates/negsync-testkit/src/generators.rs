//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use negsync_core::{Bound, Item, ItemId};

/// Generate a random ItemId.
pub fn item_id() -> impl Strategy<Value = ItemId> {
    any::<[u8; 32]>().prop_map(ItemId)
}

/// Generate a timestamp below the infinity sentinel.
pub fn timestamp() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..1_000,
        1_600_000_000u64..1_800_000_000,
        0u64..u64::MAX,
    ]
}

/// Generate an item.
pub fn item() -> impl Strategy<Value = Item> {
    (timestamp(), item_id()).prop_map(|(ts, id)| Item::new(ts, id))
}

/// Generate a bound, including infinity and id prefixes of every length.
pub fn bound() -> impl Strategy<Value = Bound> {
    prop_oneof![
        Just(Bound::infinity()),
        timestamp().prop_map(Bound::new),
        (timestamp(), item_id(), 0usize..=32).prop_map(|(ts, id, len)| {
            match Bound::with_prefix(ts, &id.as_bytes()[..len]) {
                Ok(bound) => bound,
                Err(_) => Bound::new(ts),
            }
        }),
    ]
}

/// Generate a set of unique items, up to `max` of them.
///
/// Timestamps come from a narrow range so that equal timestamps and
/// id-based ordering are common.
pub fn item_set(max: usize) -> impl Strategy<Value = Vec<Item>> {
    prop::collection::btree_map(item_id(), 0u64..64, 0..=max).prop_map(to_items)
}

/// Two overlapping item sets: `(local, remote)`.
pub fn overlapping_sets(max_shared: usize, max_unique: usize) -> impl Strategy<Value = (Vec<Item>, Vec<Item>)> {
    (
        prop::collection::btree_map(item_id(), 0u64..64, 0..=max_shared),
        prop::collection::btree_map(item_id(), 0u64..64, 0..=max_unique),
        prop::collection::btree_map(item_id(), 0u64..64, 0..=max_unique),
    )
        .prop_map(|(shared, mut only_local, mut only_remote)| {
            only_local.retain(|id, _| !shared.contains_key(id));
            only_remote.retain(|id, _| !shared.contains_key(id) && !only_local.contains_key(id));

            let mut local = to_items(shared.clone());
            local.extend(to_items(only_local));
            let mut remote = to_items(shared);
            remote.extend(to_items(only_remote));
            (local, remote)
        })
}

/// Two item sets whose difference density changes every 64 items.
///
/// Blocks are identical, fully disjoint, or sparse on either side, so a
/// single frame mixes skips, fingerprint echoes and long id lists.
pub fn mixed_density_sets(max: usize) -> impl Strategy<Value = (Vec<Item>, Vec<Item>)> {
    (
        prop::collection::btree_set(item_id(), 0..=max),
        prop::collection::vec(0u8..4, max / 64 + 1),
    )
        .prop_map(|(ids, densities)| {
            let mut local = Vec::new();
            let mut remote = Vec::new();
            for (n, id) in ids.into_iter().enumerate() {
                let item = Item::new(n as u64, id);
                let roll = id.as_bytes()[0];
                match densities[n / 64] {
                    0 => {
                        local.push(item);
                        remote.push(item);
                    }
                    1 if roll < 128 => local.push(item),
                    1 => remote.push(item),
                    2 => {
                        local.push(item);
                        if roll < 240 {
                            remote.push(item);
                        }
                    }
                    _ => {
                        remote.push(item);
                        if roll < 240 {
                            local.push(item);
                        }
                    }
                }
            }
            (local, remote)
        })
}

fn to_items(map: BTreeMap<ItemId, u64>) -> Vec<Item> {
    map.into_iter().map(|(id, ts)| Item::new(ts, id)).collect()
}
