//! Maps `SchedulingError` onto gRPC status codes (spec §7 / the RPC error
//! table in the design notes): this is a separate, coarser mapping from the
//! `Error`/`InternalError` event codes the operations projection computes,
//! since a synchronous RPC failure and a session's terminal state are
//! different things reported over different channels.

use common::SchedulingError;
use tonic::{Code, Status};

pub fn scheduling_error_to_status(error: SchedulingError) -> Status {
    let code = match &error {
        SchedulingError::Validation { .. } => Code::InvalidArgument,
        SchedulingError::DuplicateSession { .. } => Code::AlreadyExists,
        SchedulingError::UnknownSession { .. } => Code::NotFound,
        SchedulingError::Resource { .. } => Code::FailedPrecondition,
        SchedulingError::Provisioning { .. }
        | SchedulingError::Test { .. }
        | SchedulingError::Timeout { .. } => Code::Unknown,
        SchedulingError::Internal { .. } | SchedulingError::Cluster { .. } => Code::Internal,
        SchedulingError::NotRunning | SchedulingError::StopTimeout => Code::Unavailable,
    };
    Status::new(code, error.to_string())
}
