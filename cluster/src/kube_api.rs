//! The one production `ClusterApi` implementation, built on `kube` and
//! `k8s-openapi` the way `common-lib` and `k8s/operators/src/diskpool`
//! already depend on them.
//!
//! Discovery mode follows spec §6: `APP_ENV=production` selects in-cluster
//! config; otherwise a kubeconfig is read from `KUBE_CONFIG_FILE`.

use crate::api::{ClusterApi, ClusterError, NodeInfo};
use async_trait::async_trait;
use common::types::SessionName;
use futures::{stream::BoxStream, StreamExt};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{
    api::{Api, DeleteParams, ListParams, LogParams, PostParams},
    Client, Config,
};
use kube_runtime::watcher;
use std::env;

const POOL_LABEL: &str = "pool";
const SESSION_LABEL: &str = "session-name";

/// Reads `APP_ENV`/`KUBE_CONFIG_FILE` to build a `kube::Client` the way the
/// real scheduler binary does at startup.
pub async fn discover_client() -> Result<Client, ClusterError> {
    let in_cluster = env::var("APP_ENV").map(|v| v == "production").unwrap_or(false);
    if in_cluster {
        Client::try_default()
            .await
            .map_err(|e| ClusterError::ListNodes {
                message: format!("failed to build in-cluster client: {}", e),
            })
    } else {
        let path = env::var("KUBE_CONFIG_FILE").unwrap_or_else(|_| "~/.kube/config".to_string());
        let config = Config::from_custom_kubeconfig(
            kube::config::Kubeconfig::read_from(&path).map_err(|e| ClusterError::ListNodes {
                message: format!("failed to read kubeconfig {}: {}", path, e),
            })?,
            &Default::default(),
        )
        .await
        .map_err(|e| ClusterError::ListNodes {
            message: format!("failed to build client from kubeconfig: {}", e),
        })?;
        Ok(Client::try_from(config).map_err(|e| ClusterError::ListNodes {
            message: format!("failed to build client: {}", e),
        })?)
    }
}

/// A `ClusterApi` backed by a live `kube::Client`.
pub struct KubeClusterApi {
    client: Client,
    namespace: String,
}

impl KubeClusterApi {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn create_pod(&self, pod: Pod) -> Result<(), ClusterError> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.pods()
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| ClusterError::CreatePod {
                name,
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete_session_pods(&self, session: &SessionName) -> Result<(), ClusterError> {
        let selector = format!("{}={}", SESSION_LABEL, session);
        let params = ListParams::default().labels(&selector);
        self.pods()
            .delete_collection(&DeleteParams::default(), &params)
            .await
            .map_err(|e| ClusterError::DeletePods {
                session: session.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn get_logs(&self, pod_name: &str) -> Result<String, ClusterError> {
        self.pods()
            .logs(pod_name, &LogParams::default())
            .await
            .map_err(|e| ClusterError::GetLogs {
                name: pod_name.to_string(),
                message: e.to_string(),
            })
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::ListNodes {
                message: e.to_string(),
            })?;

        Ok(list
            .items
            .into_iter()
            .map(|node| {
                let pool = node
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(POOL_LABEL))
                    .cloned();
                NodeInfo {
                    name: node.metadata.name.unwrap_or_default(),
                    pool,
                }
            })
            .collect())
    }

    async fn watch_pods(&self) -> Result<BoxStream<'static, Pod>, ClusterError> {
        let stream = watcher(self.pods(), ListParams::default())
            .filter_map(|event| async move { event.ok() })
            .flat_map(|event| {
                let pods = match event {
                    watcher::Event::Applied(pod) => vec![pod],
                    watcher::Event::Deleted(pod) => vec![pod],
                    watcher::Event::Restarted(pods) => pods,
                };
                futures::stream::iter(pods)
            });
        Ok(Box::pin(stream))
    }
}

/// Pool discovery (spec §4.1): nodes without the `pool` label are skipped.
pub async fn discover_pools(cluster: &dyn ClusterApi) -> Result<Vec<(String, usize)>, ClusterError> {
    let nodes = cluster.list_nodes().await?;
    let mut counts = std::collections::HashMap::<String, usize>::new();
    for node in nodes {
        if let Some(pool) = node.pool {
            *counts.entry(pool).or_default() += 1;
        }
    }
    Ok(counts.into_iter().collect())
}
