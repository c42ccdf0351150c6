//! The scheduling façade seam (spec §4.9): the narrow surface `grpc`'s
//! server implementation calls into, kept in `common` so neither crate
//! depends on the other. `scheduler-agent` provides the one real
//! implementation.

use crate::{
    error::SchedulingError,
    types::{Operation, StartSessionRequest},
};
use async_trait::async_trait;

#[async_trait]
pub trait SchedulingFacade: Send + Sync {
    /// Builds and schedules a new session (spec §4.9).
    async fn start_test_session(
        &self,
        request: StartSessionRequest,
    ) -> Result<Operation, SchedulingError>;

    /// Projects the current operation for `name` (`"operations/<sessionName>"`).
    async fn get_operation(&self, name: &str) -> Result<Operation, SchedulingError>;
}
