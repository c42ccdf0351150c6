//! Pool registry (spec §4.1): a process-lifetime map of pool name to
//! capacity/availability counters. Not mutated at runtime once discovery has
//! populated it; the reservation ledger (`ledger.rs`) owns the mutation of
//! `available`.

use crate::types::{Pool, PoolName};
use std::collections::HashMap;

/// Named pools with capacity and availability counters.
#[derive(Clone, Debug, Default)]
pub struct PoolRegistry {
    pools: HashMap<PoolName, Pool>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }

    /// Registers a pool discovered on the cluster with
    /// `capacity = available = count of labeled nodes` (spec §4.1).
    pub fn register(&mut self, name: impl Into<PoolName>, node_count: usize) {
        let name = name.into();
        self.pools.insert(name.clone(), Pool::new(name, node_count));
    }

    pub fn get(&self, name: &PoolName) -> Option<&Pool> {
        self.pools.get(name)
    }

    pub fn get_mut(&mut self, name: &PoolName) -> Option<&mut Pool> {
        self.pools.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn contains(&self, name: &PoolName) -> bool {
        self.pools.contains_key(name)
    }
}
