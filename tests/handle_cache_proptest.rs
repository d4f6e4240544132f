// HandleCache property tests.
//
// Property: the cache behaves like a recency-ordered list of configurations
// bounded by capacity.
//  - Model: Vec of key indices, most recently used first, plus the handle
//    the cache returned for each cached key.
//  - Operations: open cached, open skip-cache, close the cached handle,
//    remove the cached handle from the index.
//  - Invariants after each step: len() <= capacity; cached_configs() equals
//    the model order; every handle the model still caches is open; every
//    handle the model dropped by eviction or close is closed; live_handles()
//    equals cached plus open skip-cache handles.
mod common;

use common::{cfg, memory_cache};
use proptest::prelude::*;
use reopen_cache::ResourceHandle;
use std::collections::HashMap;

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_cache_matches_lru_model(
        cap in 1usize..=4,
        keys in 1usize..=6,
        ops in proptest::collection::vec((0u8..=3u8, 0usize..100usize), 1..80),
    ) {
        let (cache, log) = memory_cache(cap);
        let mut order: Vec<usize> = Vec::new();
        let mut cached: HashMap<usize, ResourceHandle> = HashMap::new();
        let mut dropped: Vec<ResourceHandle> = Vec::new();
        let mut private: Vec<ResourceHandle> = Vec::new();
        let mut expected_opens = 0usize;

        for (op, raw_k) in ops {
            let k = raw_k % keys;
            let name = format!("k{k}");
            match op {
                // Cached open: a hit returns the same instance and refreshes recency.
                0 => {
                    let h = cache.get_or_open(cfg(&name), false).unwrap();
                    if let Some(pos) = order.iter().position(|&x| x == k) {
                        prop_assert!(h.ptr_eq(&cached[&k]), "hit must return the cached handle");
                        order.remove(pos);
                    } else {
                        expected_opens += 1;
                        cached.insert(k, h);
                        if order.len() == cap {
                            let victim = order.pop().unwrap();
                            dropped.push(cached.remove(&victim).unwrap());
                        }
                    }
                    order.insert(0, k);
                }
                // Skip-cache open: always new, never indexed.
                1 => {
                    let h = cache.get_or_open(cfg(&name), true).unwrap();
                    expected_opens += 1;
                    if let Some(c) = cached.get(&k) {
                        prop_assert!(!h.ptr_eq(c));
                    }
                    private.push(h);
                }
                // Close the cached handle for this key.
                2 => {
                    if let Some(h) = cached.remove(&k) {
                        h.close().unwrap();
                        order.retain(|&x| x != k);
                        dropped.push(h);
                    }
                }
                // Remove from the index without closing; the caller now owns it.
                3 => {
                    if let Some(h) = cached.remove(&k) {
                        prop_assert_eq!(cache.remove(&h), 1);
                        order.retain(|&x| x != k);
                        prop_assert!(h.is_open());
                        h.close().unwrap();
                    }
                }
                _ => unreachable!(),
            }

            prop_assert!(cache.len() <= cap);
            let expected: Vec<_> = order.iter().map(|k| cfg(&format!("k{k}"))).collect();
            prop_assert_eq!(cache.cached_configs(), expected);
            for h in cached.values() {
                prop_assert!(h.is_open());
            }
            for h in &dropped {
                prop_assert!(!h.is_open());
            }
            prop_assert_eq!(cache.live_handles(), cached.len() + private.len());
            prop_assert_eq!(log.opens(), expected_opens);
        }
    }
}
