//! Wire <-> domain conversions for the scheduling service, following
//! `control-plane/grpc`'s pattern of a `From`/fallible-`TryFrom` impl per
//! message rather than conversion logic inline in the service methods.

use common::{
    error::ValidationSnafu,
    types::{ComponentKind, ComponentRequest, FailureCode, Operation, StartSessionRequest},
    SchedulingError,
};
use rpc::scheduling;
use snafu::ensure;

impl From<ComponentKind> for scheduling::ComponentKind {
    fn from(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Driver => scheduling::ComponentKind::Driver,
            ComponentKind::Server => scheduling::ComponentKind::Server,
            ComponentKind::Client => scheduling::ComponentKind::Client,
        }
    }
}

fn component_kind_from_wire(kind: i32) -> Result<ComponentKind, SchedulingError> {
    match scheduling::ComponentKind::from_i32(kind) {
        Some(scheduling::ComponentKind::Driver) => Ok(ComponentKind::Driver),
        Some(scheduling::ComponentKind::Server) => Ok(ComponentKind::Server),
        Some(scheduling::ComponentKind::Client) => Ok(ComponentKind::Client),
        None => ValidationSnafu {
            message: format!("unknown component kind {}", kind),
        }
        .fail(),
    }
}

fn component_request_from_wire(
    spec: scheduling::ComponentSpec,
) -> Result<ComponentRequest, SchedulingError> {
    ensure!(
        !spec.image.is_empty(),
        ValidationSnafu {
            message: "component image must not be empty".to_string(),
        }
    );
    ensure!(
        !spec.pool.is_empty(),
        ValidationSnafu {
            message: "component pool must not be empty".to_string(),
        }
    );
    Ok(ComponentRequest {
        image: spec.image,
        kind: component_kind_from_wire(spec.kind)?,
        pool: spec.pool.into(),
    })
}

/// Parses a `StartTestSessionRequest` into its domain form, validating
/// every field the projection and pod spec builder later assume are
/// present (spec §7: malformed requests fail synchronously).
pub fn start_session_request_from_wire(
    request: scheduling::StartTestSessionRequest,
) -> Result<StartSessionRequest, SchedulingError> {
    let driver = request.driver.ok_or_else(|| {
        ValidationSnafu {
            message: "missing driver component".to_string(),
        }
        .build()
    })?;
    let driver = component_request_from_wire(driver)?;
    ensure!(
        driver.kind == ComponentKind::Driver,
        ValidationSnafu {
            message: "driver component must have kind=driver".to_string(),
        }
    );

    let workers = request
        .workers
        .into_iter()
        .map(component_request_from_wire)
        .collect::<Result<Vec<_>, _>>()?;
    ensure!(
        !workers.is_empty(),
        ValidationSnafu {
            message: "a session requires at least one worker".to_string(),
        }
    );

    let scenario = serde_json::from_str(&request.scenario).map_err(|e| {
        ValidationSnafu {
            message: format!("scenario is not valid JSON: {}", e),
        }
        .build()
    })?;

    Ok(StartSessionRequest {
        scenario,
        driver,
        workers,
    })
}

/// Projects a domain `Operation` onto its wire representation (spec §4.8).
pub fn operation_to_wire(operation: Operation) -> scheduling::Operation {
    let (event_kind, event_description, event_time) = match &operation.metadata.latest_event {
        Some(event) => (
            event.kind.to_string(),
            event.description.clone(),
            event.time.to_rfc3339(),
        ),
        None => (String::new(), String::new(), String::new()),
    };

    let metadata = scheduling::OperationMetadata {
        has_latest_event: operation.metadata.latest_event.is_some(),
        event_kind,
        event_description,
        event_time,
        service_version: operation.metadata.service_version,
    };

    let result = if let Some(success) = operation.success {
        Some(scheduling::operation::Result::Success(
            scheduling::SuccessResult {
                driver_logs: success.driver_logs,
                elapsed_millis: success.elapsed.num_milliseconds(),
            },
        ))
    } else {
        operation.failure.map(|failure| {
            let code = match failure.code {
                FailureCode::Internal => tonic::Code::Internal,
                FailureCode::Unknown => tonic::Code::Unknown,
            };
            scheduling::operation::Result::Failure(scheduling::FailureResult {
                code: code as u32,
                message: failure.message,
            })
        })
    };

    scheduling::Operation {
        name: operation.name,
        done: operation.done,
        metadata: Some(metadata),
        result,
    }
}
