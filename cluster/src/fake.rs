//! In-memory `ClusterApi` test double (spec §8: end-to-end scenarios are
//! driven against a fake rather than a live cluster), grounded in the
//! teacher's own pattern of exercising the control plane against a
//! composed-but-fake cluster (`deployer-cluster`, used only from
//! `agents`' `dev-dependencies`) rather than a real one in tests.

use crate::api::{ClusterApi, ClusterError, NodeInfo};
use async_trait::async_trait;
use common::types::SessionName;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
    ContainerStatus, Pod, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

struct Inner {
    created: Vec<Pod>,
    deleted_sessions: Vec<SessionName>,
    logs: HashMap<String, String>,
    nodes: Vec<NodeInfo>,
}

/// A fake cluster backed by in-memory bookkeeping and a manually-driven
/// pod-watch event stream.
pub struct FakeClusterApi {
    inner: Mutex<Inner>,
    event_tx: mpsc::UnboundedSender<Pod>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<Pod>>>,
}

impl FakeClusterApi {
    pub fn new(nodes: Vec<NodeInfo>) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            inner: Mutex::new(Inner {
                created: Vec::new(),
                deleted_sessions: Vec::new(),
                logs: HashMap::new(),
                nodes,
            }),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    /// Injects a pod update as if the upstream watch had reported it.
    pub fn push_pod_event(&self, pod: Pod) {
        let _ = self.event_tx.send(pod);
    }

    pub fn set_logs(&self, pod_name: &str, logs: impl Into<String>) {
        self.inner.lock().logs.insert(pod_name.to_string(), logs.into());
    }

    pub fn created_pods(&self) -> Vec<Pod> {
        self.inner.lock().created.clone()
    }

    pub fn deleted_sessions(&self) -> Vec<SessionName> {
        self.inner.lock().deleted_sessions.clone()
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn create_pod(&self, pod: Pod) -> Result<(), ClusterError> {
        self.inner.lock().created.push(pod);
        Ok(())
    }

    async fn delete_session_pods(&self, session: &SessionName) -> Result<(), ClusterError> {
        self.inner.lock().deleted_sessions.push(session.clone());
        Ok(())
    }

    async fn get_logs(&self, pod_name: &str) -> Result<String, ClusterError> {
        Ok(self
            .inner
            .lock()
            .logs
            .get(pod_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        Ok(self.inner.lock().nodes.clone())
    }

    async fn watch_pods(&self) -> Result<BoxStream<'static, Pod>, ClusterError> {
        let mut guard = self.event_rx.lock();
        let rx = guard
            .take()
            .ok_or_else(|| ClusterError::Watch {
                message: "fake cluster only supports a single watch".to_string(),
            })?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Builds a minimal single-container pod for tests: `running` selects a
/// `Running` current state (with pod IP `127.0.0.1`) when `exit_code` is
/// `None`; `exit_code` takes priority and produces a terminated state.
pub fn pod_fixture(session: &str, component: &str, running: bool, exit_code: Option<i32>) -> Pod {
    let state = if let Some(code) = exit_code {
        ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code: code,
                reason: Some(if code == 0 { "Completed" } else { "Error" }.to_string()),
                message: None,
                ..Default::default()
            }),
            ..Default::default()
        }
    } else if running {
        ContainerState {
            running: Some(ContainerStateRunning { started_at: None }),
            ..Default::default()
        }
    } else {
        ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: None,
                message: None,
            }),
            ..Default::default()
        }
    };

    let mut labels = std::collections::BTreeMap::new();
    labels.insert("session-name".to_string(), session.to_string());
    labels.insert("component-name".to_string(), component.to_string());

    Pod {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}", session, component)),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec::default()),
        status: Some(PodStatus {
            pod_ip: if running && exit_code.is_none() {
                Some("127.0.0.1".to_string())
            } else {
                None
            },
            container_statuses: Some(vec![ContainerStatus {
                name: format!("{}-main", component),
                state: Some(state),
                ready: running,
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}
