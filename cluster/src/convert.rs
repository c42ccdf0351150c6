//! Conversions from `k8s_openapi` pod types into the crate-local views used
//! by health classification (`crate::health`). Isolated here so both the
//! watcher and the fake cluster API share exactly one mapping.

use crate::health::{ContainerStateView, ContainerStatusView};
use k8s_openapi::api::core::v1::{ContainerState, ContainerStatus, Pod};
use std::collections::HashMap;

pub fn container_statuses_view(pod: &Pod) -> Vec<ContainerStatusView> {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(container_status_view).collect())
        .unwrap_or_default()
}

fn container_status_view(status: &ContainerStatus) -> ContainerStatusView {
    ContainerStatusView {
        state: status.state.as_ref().and_then(container_state_view),
        last_state: status.last_state.as_ref().and_then(container_state_view),
    }
}

fn container_state_view(state: &ContainerState) -> Option<ContainerStateView> {
    if let Some(terminated) = &state.terminated {
        return Some(ContainerStateView::Terminated {
            exit_code: terminated.exit_code,
            reason: terminated.reason.clone(),
            message: terminated.message.clone(),
        });
    }
    if let Some(waiting) = &state.waiting {
        return Some(ContainerStateView::Waiting {
            reason: waiting.reason.clone(),
        });
    }
    if state.running.is_some() {
        return Some(ContainerStateView::Running);
    }
    None
}

pub fn pod_ip(pod: &Pod) -> Option<String> {
    pod.status.as_ref().and_then(|s| s.pod_ip.clone())
}

pub fn labels(pod: &Pod) -> HashMap<String, String> {
    pod.metadata.labels.clone().unwrap_or_default()
}

pub fn pod_name(pod: &Pod) -> Option<String> {
    pod.metadata.name.clone()
}
