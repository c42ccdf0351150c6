//! Domain types and the in-memory orchestration primitives shared by every
//! crate in the workspace: the session/component/pool/event/operation data
//! model (§3), the reservation ledger and wait queue (§4.2-4.3), the event
//! store (§4.7) and the operations projection (§4.8).
//!
//! Persistence is explicitly out of scope: everything here lives for the
//! lifetime of the process.

pub mod error;
pub mod facade;
pub mod ledger;
pub mod operations;
pub mod pool;
pub mod queue;
pub mod store;
pub mod types;

pub use error::{ReservationError, SchedulingError};
pub use facade::SchedulingFacade;
pub use types::{
    Component, ComponentKind, ComponentName, ComponentRequest, Event, EventKind, Operation, Pool,
    PoolName, Session, SessionName, StartSessionRequest,
};
