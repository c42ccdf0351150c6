//! Reservation ledger (spec §4.2): atomically reserve/release per-session
//! pool counts. The ledger itself is not thread-safe -- the wait queue
//! (`queue.rs`) wraps it under a single lock, matching the teacher's
//! pattern of small, non-thread-safe building blocks composed under one
//! `parking_lot::Mutex` at the call site.

use crate::{
    error::{PoolAvailabilitySnafu, PoolCapacitySnafu, PoolUnknownSnafu, ReservationError},
    pool::PoolRegistry,
    types::{PoolName, Session},
};
use snafu::ensure;
use std::collections::HashMap;

/// Owns the pool registry and exposes `reserve`/`release` over it.
pub struct ReservationLedger {
    registry: PoolRegistry,
}

impl ReservationLedger {
    pub fn new(registry: PoolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    /// Reserves capacity for `session`'s requirement. On success, decrements
    /// `available` for every pool involved by the required count,
    /// atomically: a partial reservation never escapes a failed call.
    pub fn reserve(&mut self, session: &Session) -> Result<(), ReservationError> {
        let requirement = session.pool_requirement();
        self.check(&requirement)?;

        for (pool, count) in &requirement {
            let pool_entry = self
                .registry
                .get_mut(pool)
                .expect("checked present by `check`");
            pool_entry.available -= count;
        }
        Ok(())
    }

    /// Releases a previous reservation. Does not verify that a prior
    /// `reserve` actually succeeded for this session (spec §4.2).
    pub fn release(&mut self, session: &Session) {
        let requirement = session.pool_requirement();
        for (pool, count) in &requirement {
            if let Some(pool_entry) = self.registry.get_mut(pool) {
                pool_entry.available += count;
            }
        }
    }

    fn check(&self, requirement: &HashMap<PoolName, usize>) -> Result<(), ReservationError> {
        for (pool, &requested) in requirement {
            let pool_entry = self.registry.get(pool).context_pool(pool)?;
            ensure!(
                requested <= pool_entry.capacity,
                PoolCapacitySnafu {
                    pool: pool.clone(),
                    requested,
                    capacity: pool_entry.capacity,
                }
            );
            ensure!(
                requested <= pool_entry.available,
                PoolAvailabilitySnafu {
                    pool: pool.clone(),
                    requested,
                    available: pool_entry.available,
                }
            );
        }
        Ok(())
    }
}

trait OptionPoolExt<'a> {
    fn context_pool(self, pool: &PoolName) -> Result<&'a crate::types::Pool, ReservationError>;
}

impl<'a> OptionPoolExt<'a> for Option<&'a crate::types::Pool> {
    fn context_pool(self, pool: &PoolName) -> Result<&'a crate::types::Pool, ReservationError> {
        self.ok_or_else(|| {
            PoolUnknownSnafu { pool: pool.clone() }
                .build()
        })
    }
}
