//! Error kinds from spec §7, expressed as `snafu`-derived enums the way
//! `common-lib`'s `mbus_api` errors are: one variant per failure mode, with
//! enough context to render the human description stored on an `Error`/
//! `InternalError` event.

use crate::types::{PoolName, SessionName};
use snafu::Snafu;

/// Reservation-ledger errors (spec §4.2). `PoolCapacity` and `PoolUnknown`
/// are permanent: the session can never run. `PoolAvailability` is
/// transient: it may succeed on a later attempt.
#[derive(Debug, Snafu, Clone, Eq, PartialEq)]
#[snafu(visibility(pub))]
pub enum ReservationError {
    #[snafu(display("pool {} is not registered", pool))]
    PoolUnknown { pool: PoolName },

    #[snafu(display(
        "session requires {} machines from pool {} but its capacity is only {}",
        requested,
        pool,
        capacity
    ))]
    PoolCapacity {
        pool: PoolName,
        requested: usize,
        capacity: usize,
    },

    #[snafu(display(
        "session requires {} machines from pool {} but only {} are available",
        requested,
        pool,
        available
    ))]
    PoolAvailability {
        pool: PoolName,
        requested: usize,
        available: usize,
    },
}

impl ReservationError {
    /// `true` for errors that can never be resolved by waiting (spec §4.3:
    /// "implementations SHOULD evict and fail permanently-unschedulable
    /// sessions").
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ReservationError::PoolUnknown { .. } | ReservationError::PoolCapacity { .. }
        )
    }
}

/// Top-level scheduling error kinds from spec §7.
#[derive(Debug, Snafu, Clone)]
#[snafu(visibility(pub))]
pub enum SchedulingError {
    #[snafu(display("validation failed: {}", message))]
    Validation { message: String },

    #[snafu(display("session {} already exists", name))]
    DuplicateSession { name: SessionName },

    #[snafu(display("unknown session {}", name))]
    UnknownSession { name: SessionName },

    #[snafu(display("resource error: {}", source))]
    Resource { source: ReservationError },

    #[snafu(display("provisioning failed for session {}: {}", session, message))]
    Provisioning { session: SessionName, message: String },

    #[snafu(display("test failed for session {}: {}", session, message))]
    Test { session: SessionName, message: String },

    #[snafu(display("session {} timed out: {}", session, message))]
    Timeout { session: SessionName, message: String },

    #[snafu(display("internal error for session {}: {}", session, message))]
    Internal { session: SessionName, message: String },

    #[snafu(display("cluster error: {}", message))]
    Cluster { message: String },

    #[snafu(display("the controller is not running"))]
    NotRunning,

    #[snafu(display("stop timed out before all executors drained"))]
    StopTimeout,
}

impl From<ReservationError> for SchedulingError {
    fn from(source: ReservationError) -> Self {
        SchedulingError::Resource { source }
    }
}

pub type Result<T, E = SchedulingError> = std::result::Result<T, E>;
