//! Operations projection (spec §4.8): derives an `Operation` from a session
//! and its latest event. Pure, no I/O -- directly unit-testable.

use crate::{
    error::SchedulingError,
    store::Store,
    types::{
        Event, EventKind, FailureCode, FailureStatus, Operation, OperationMetadata, Session,
        SessionName, SuccessResult,
    },
};

const OPERATION_PREFIX: &str = "operations/";

/// Builds the `operations/<name>` resource name for a session.
pub fn operation_name(session: &SessionName) -> String {
    format!("{}{}", OPERATION_PREFIX, session)
}

/// Pure projection over `(session, latest event)` (spec §4.8).
pub fn project(session: &Session, latest: Option<Event>, service_version: &str) -> Operation {
    let name = operation_name(&session.name);

    let done = matches!(
        latest.as_ref().map(|e| e.kind),
        Some(EventKind::Done) | Some(EventKind::Error) | Some(EventKind::InternalError)
    );

    let (success, failure) = match &latest {
        Some(event) if done && matches!(event.kind, EventKind::Done) => {
            let success = SuccessResult {
                driver_logs: event.driver_logs.clone().unwrap_or_default(),
                // Preserves the source system's exact (and backwards) formula;
                // see DESIGN.md Open Questions.
                elapsed: session.create_time - event.time,
            };
            (Some(success), None)
        }
        Some(event)
            if done
                && matches!(
                    event.kind,
                    EventKind::Error | EventKind::InternalError
                ) =>
        {
            let code = match event.kind {
                EventKind::InternalError => FailureCode::Internal,
                _ => FailureCode::Unknown,
            };
            let failure = FailureStatus {
                code,
                message: event.description.clone(),
            };
            (None, Some(failure))
        }
        _ => (None, None),
    };

    Operation {
        name,
        done,
        metadata: OperationMetadata {
            latest_event: latest,
            service_version: service_version.to_string(),
        },
        success,
        failure,
    }
}

/// Looks up the operation for `operations/<sessionName>`, reading the store
/// for the session and its latest event. Fails if the `operations/` prefix
/// is missing or the session is unknown.
pub fn get_operation(
    store: &Store,
    name: &str,
    service_version: &str,
) -> Result<Operation, SchedulingError> {
    let session_name = name.strip_prefix(OPERATION_PREFIX).ok_or_else(|| {
        SchedulingError::Validation {
            message: format!("operation name {} is missing the operations/ prefix", name),
        }
    })?;
    let session_name = SessionName::from(session_name);

    let session = store
        .get_session(&session_name)
        .ok_or(SchedulingError::UnknownSession {
            name: session_name.clone(),
        })?;
    let latest = store.get_latest_event(&session_name)?;

    Ok(project(&session, latest, service_version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Component, ComponentKind};
    use serde_json::json;

    fn session() -> Session {
        let driver = Component::new("d", "img", ComponentKind::Driver, "p");
        Session::new("sess", driver, vec![], json!({})).unwrap()
    }

    #[test]
    fn no_event_yet_is_not_done() {
        let op = project(&session(), None, "v1");
        assert!(!op.done);
        assert!(op.metadata.latest_event.is_none());
        assert!(op.success.is_none());
        assert!(op.failure.is_none());
        assert_eq!(op.name, "operations/sess");
    }

    #[test]
    fn done_event_yields_success_payload() {
        let s = session();
        let event = Event::new(s.name.clone(), EventKind::Done, "done")
            .with_driver_logs("driver output");
        let op = project(&s, Some(event), "v1");
        assert!(op.done);
        assert!(op.failure.is_none());
        let success = op.success.unwrap();
        assert_eq!(success.driver_logs, "driver output");
    }

    #[test]
    fn error_event_yields_unknown_failure_code() {
        let s = session();
        let event = Event::new(s.name.clone(), EventKind::Error, "boom");
        let op = project(&s, Some(event), "v1");
        assert!(op.done);
        let failure = op.failure.unwrap();
        assert!(matches!(failure.code, FailureCode::Unknown));
        assert_eq!(failure.message, "boom");
    }

    #[test]
    fn internal_error_event_yields_internal_failure_code() {
        let s = session();
        let event = Event::new(s.name.clone(), EventKind::InternalError, "cleanup failed");
        let op = project(&s, Some(event), "v1");
        assert!(op.done);
        let failure = op.failure.unwrap();
        assert!(matches!(failure.code, FailureCode::Internal));
    }

    #[test]
    fn intermediate_event_is_not_done() {
        let s = session();
        let event = Event::new(s.name.clone(), EventKind::Provision, "provisioning");
        let op = project(&s, Some(event), "v1");
        assert!(!op.done);
        assert!(op.success.is_none());
        assert!(op.failure.is_none());
    }

    #[test]
    fn get_operation_requires_prefix() {
        let store = Store::new();
        let err = get_operation(&store, "bogus", "v1").unwrap_err();
        assert!(matches!(err, SchedulingError::Validation { .. }));
    }

    #[test]
    fn get_operation_requires_known_session() {
        let store = Store::new();
        let err = get_operation(&store, "operations/unknown", "v1").unwrap_err();
        assert!(matches!(err, SchedulingError::UnknownSession { .. }));
    }
}
