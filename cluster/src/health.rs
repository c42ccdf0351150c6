//! Pod health classification (spec §4.4), expressed over a small
//! crate-local view of a container status rather than the raw
//! `k8s_openapi` type, so the classifier is unit-testable without
//! constructing a full `Pod` object. [`kube_api`](crate::kube_api) is the
//! only place that converts a real `ContainerStatus` into this view.

use serde::{Deserialize, Serialize};

/// The subset of `k8s_openapi::api::core::v1::ContainerState` the
/// classifier cares about.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContainerStateView {
    Waiting { reason: Option<String> },
    Running,
    Terminated {
        exit_code: i32,
        reason: Option<String>,
        message: Option<String>,
    },
}

/// The subset of `k8s_openapi::api::core::v1::ContainerStatus` the
/// classifier cares about: both the current and last-terminated state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatusView {
    pub state: Option<ContainerStateView>,
    pub last_state: Option<ContainerStateView>,
}

/// Health classification result for one pod (spec §4.4).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Health {
    Ready,
    Succeeded,
    Failed {
        reason: Option<String>,
        message: Option<String>,
    },
    Unknown,
    NotReady { error: String },
}

const CRASH_LOOP_BACKOFF: &str = "CrashLoopBackOff";

/// Classifies a pod's health from its container statuses (spec §4.4):
///
/// - exactly one container status is expected; any other count is
///   `NotReady` with a malformed-pod error;
/// - if a last-terminated or current-terminated state is present, exit code
///   0 is `Succeeded`, non-zero is `Failed`;
/// - else if the current state is waiting with reason `CrashLoopBackOff`,
///   `Failed`;
/// - else if the current state is running, `Ready`;
/// - else `Unknown`.
pub fn classify(statuses: &[ContainerStatusView]) -> Health {
    if statuses.len() != 1 {
        return Health::NotReady {
            error: format!(
                "expected exactly one container status, found {}",
                statuses.len()
            ),
        };
    }
    let status = &statuses[0];

    if let Some(terminated) = terminated_state(status) {
        return match terminated {
            ContainerStateView::Terminated {
                exit_code,
                reason,
                message,
            } if *exit_code == 0 => Health::Succeeded,
            ContainerStateView::Terminated { reason, message, .. } => Health::Failed {
                reason: reason.clone(),
                message: message.clone(),
            },
            _ => unreachable!("terminated_state only returns Terminated variants"),
        };
    }

    match &status.state {
        Some(ContainerStateView::Waiting { reason }) if reason.as_deref() == Some(CRASH_LOOP_BACKOFF) => {
            Health::Failed {
                reason: reason.clone(),
                message: None,
            }
        }
        Some(ContainerStateView::Running) => Health::Ready,
        _ => Health::Unknown,
    }
}

fn terminated_state(status: &ContainerStatusView) -> Option<&ContainerStateView> {
    match (&status.last_state, &status.state) {
        (Some(t @ ContainerStateView::Terminated { .. }), _) => Some(t),
        (_, Some(t @ ContainerStateView::Terminated { .. })) => Some(t),
        _ => None,
    }
}
