//! The narrow cluster API the scheduler core consumes (spec §6.2): pod
//! create/delete/delete-collection-by-label, get-logs, pod watch, node
//! list. Deliberately out of scope per spec §1 beyond this interface --
//! [`kube_api::KubeClusterApi`](crate::kube_api) is the one production
//! implementation, built directly on `kube`/`k8s-openapi` the way
//! `common-lib` and `k8s/operators` already depend on them.

use async_trait::async_trait;
use common::types::SessionName;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Pod;
use snafu::Snafu;

#[derive(Debug, Snafu, Clone)]
#[snafu(visibility(pub))]
pub enum ClusterError {
    #[snafu(display("failed to create pod {}: {}", name, message))]
    CreatePod { name: String, message: String },

    #[snafu(display("failed to delete pods for session {}: {}", session, message))]
    DeletePods { session: SessionName, message: String },

    #[snafu(display("failed to fetch logs for pod {}: {}", name, message))]
    GetLogs { name: String, message: String },

    #[snafu(display("failed to list cluster nodes: {}", message))]
    ListNodes { message: String },

    #[snafu(display("failed to start pod watch: {}", message))]
    Watch { message: String },
}

/// A cluster node discovered during pool registry population (spec §4.1).
#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub name: String,
    /// `None` if the node carries no `pool` label -- such nodes are skipped
    /// during discovery.
    pub pool: Option<String>,
}

/// The cluster operations the orchestration core depends on.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Creates a pod on the cluster from a fully built spec.
    async fn create_pod(&self, pod: Pod) -> Result<(), ClusterError>;

    /// Deletes every pod labeled `session-name=<session>` (spec §4.5
    /// cleanup, §6 labels).
    async fn delete_session_pods(&self, session: &SessionName) -> Result<(), ClusterError>;

    /// Best-effort fetch of a pod's logs.
    async fn get_logs(&self, pod_name: &str) -> Result<String, ClusterError>;

    /// Lists cluster nodes for pool discovery (spec §4.1).
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError>;

    /// Starts a single cluster-wide watch stream of pod updates. The
    /// watcher fanout (`crate::watcher::PodWatcher`) is the sole consumer.
    async fn watch_pods(&self) -> Result<BoxStream<'static, Pod>, ClusterError>;
}
