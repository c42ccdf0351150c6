//! Pod spec builder (spec §4.10): maps a `(session, component)` pair into a
//! cluster pod object. Grounded in the CRD/pod-building shape of
//! `k8s/operators/src/diskpool/main.rs`, which similarly assembles
//! `k8s_openapi` objects field-by-field from a small domain type.

use common::types::{Component, ComponentKind, Session};
use k8s_openapi::{
    api::core::v1::{
        Container, ContainerPort, EnvVar, Pod, PodAffinityTerm, PodAntiAffinity, PodSpec,
        SecretVolumeSource, Volume, VolumeMount, WeightedPodAffinityTerm,
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement, ObjectMeta},
};
use std::collections::BTreeMap;

/// Port every component's main container listens on for driver control
/// traffic (spec §4.10).
pub const DRIVER_PORT: i32 = 10000;
/// Additional port exposed by server components (spec §4.10).
pub const SERVER_PORT: i32 = 10010;

const GENERATED_LABEL: &str = "generated";
const TOPOLOGY_HOSTNAME: &str = "kubernetes.io/hostname";

/// Process-wide configuration threaded into pod building, replacing the
/// teacher's pattern of a single process-global secret string (spec §9
/// design notes): it is read once at process start and passed down
/// explicitly from here on.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// Name of a cluster-managed secret mounted into the driver container
    /// for GCP credentials, if configured (`GCP_KEY_SECRET`).
    pub gcp_key_secret: Option<String>,
}

const GCP_CREDENTIALS_MOUNT_PATH: &str = "/var/run/secrets/gcp";
const GCP_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const GCP_CREDENTIALS_FILE: &str = "key.json";

/// Builds the pod object for one component of a session (spec §4.10).
pub fn build_pod(session: &Session, component: &Component, config: &RuntimeConfig) -> Pod {
    let mut labels = BTreeMap::new();
    labels.insert("session-name".to_string(), session.name.to_string());
    labels.insert("component-name".to_string(), component.name.to_string());
    labels.insert("component-kind".to_string(), component.kind.to_string());
    labels.insert(GENERATED_LABEL.to_string(), "true".to_string());

    let mut node_selector = BTreeMap::new();
    node_selector.insert("pool".to_string(), component.pool.to_string());

    let mut env: Vec<EnvVar> = component
        .env
        .iter()
        .map(|(k, v)| EnvVar {
            name: k.clone(),
            value: Some(v.clone()),
            ..Default::default()
        })
        .collect();

    let mut ports = vec![ContainerPort {
        name: Some("driver-port".to_string()),
        container_port: DRIVER_PORT,
        ..Default::default()
    }];

    match component.kind {
        ComponentKind::Driver => {
            env.push(EnvVar {
                name: "SCENARIO_JSON".to_string(),
                value: Some(session.scenario.to_string()),
                ..Default::default()
            });
        }
        ComponentKind::Server => {
            env.push(EnvVar {
                name: "WORKER_KIND".to_string(),
                value: Some("server".to_string()),
                ..Default::default()
            });
            ports.push(ContainerPort {
                name: Some("server-port".to_string()),
                container_port: SERVER_PORT,
                ..Default::default()
            });
        }
        ComponentKind::Client => {
            env.push(EnvVar {
                name: "WORKER_KIND".to_string(),
                value: Some("client".to_string()),
                ..Default::default()
            });
        }
    }

    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();
    if component.kind == ComponentKind::Driver {
        if let Some(secret_name) = &config.gcp_key_secret {
            env.push(EnvVar {
                name: GCP_CREDENTIALS_ENV.to_string(),
                value: Some(format!(
                    "{}/{}",
                    GCP_CREDENTIALS_MOUNT_PATH, GCP_CREDENTIALS_FILE
                )),
                ..Default::default()
            });
            volumes.push(Volume {
                name: "gcp-credentials".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret_name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
            volume_mounts.push(VolumeMount {
                name: "gcp-credentials".to_string(),
                mount_path: GCP_CREDENTIALS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            });
        }
    }
    let container = Container {
        name: format!("{}-main", component.name),
        image: Some(component.image.clone()),
        env: Some(env),
        ports: Some(ports),
        volume_mounts: if volume_mounts.is_empty() {
            None
        } else {
            Some(volume_mounts)
        },
        ..Default::default()
    };

    let anti_affinity = PodAntiAffinity {
        required_during_scheduling_ignored_during_execution: Some(vec![PodAffinityTerm {
            label_selector: Some(LabelSelector {
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: GENERATED_LABEL.to_string(),
                    operator: "Exists".to_string(),
                    values: None,
                }]),
                ..Default::default()
            }),
            topology_key: TOPOLOGY_HOSTNAME.to_string(),
            ..Default::default()
        }]),
        preferred_during_scheduling_ignored_during_execution: None::<
            Vec<WeightedPodAffinityTerm>,
        >,
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(component.name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_selector: Some(node_selector),
            containers: vec![container],
            restart_policy: Some("Never".to_string()),
            affinity: Some(k8s_openapi::api::core::v1::Affinity {
                pod_anti_affinity: Some(anti_affinity),
                ..Default::default()
            }),
            volumes: if volumes.is_empty() { None } else { Some(volumes) },
            ..Default::default()
        }),
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Component, ComponentKind, Session};
    use serde_json::json;

    fn session_with_driver_and_server() -> (Session, Component) {
        let driver = Component::new("driver-1", "img/driver", ComponentKind::Driver, "pool-a");
        let server = Component::new("server-1", "img/server", ComponentKind::Server, "pool-a");
        let session =
            Session::new("sess", driver, vec![server.clone()], json!({"qps": 10})).unwrap();
        (session, server)
    }

    #[test]
    fn labels_and_selector_are_set() {
        let (session, server) = session_with_driver_and_server();
        let config = RuntimeConfig::default();
        let pod = build_pod(&session, &server, &config);

        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels.get("session-name").unwrap(), "sess");
        assert_eq!(labels.get("component-name").unwrap(), "server-1");
        assert_eq!(labels.get("component-kind").unwrap(), "server");
        assert_eq!(labels.get("generated").unwrap(), "true");

        let spec = pod.spec.unwrap();
        assert_eq!(spec.node_selector.unwrap().get("pool").unwrap(), "pool-a");
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
        assert!(spec.affinity.unwrap().pod_anti_affinity.is_some());
    }

    #[test]
    fn server_gets_worker_kind_and_extra_port() {
        let (session, server) = session_with_driver_and_server();
        let pod = build_pod(&session, &server, &RuntimeConfig::default());
        let container = &pod.spec.unwrap().containers[0];
        let env = container.env.as_ref().unwrap();
        assert!(env.iter().any(|e| e.name == "WORKER_KIND" && e.value.as_deref() == Some("server")));
        let ports = container.ports.as_ref().unwrap();
        assert!(ports.iter().any(|p| p.container_port == SERVER_PORT));
    }

    #[test]
    fn driver_gets_scenario_json_and_credentials_when_configured() {
        let (session, _server) = session_with_driver_and_server();
        let config = RuntimeConfig {
            gcp_key_secret: Some("gcp-creds".to_string()),
        };
        let pod = build_pod(&session, &session.driver, &config);
        let spec = pod.spec.unwrap();
        let container = &spec.containers[0];
        let env = container.env.as_ref().unwrap();
        assert!(env.iter().any(|e| e.name == "SCENARIO_JSON"));
        assert!(env
            .iter()
            .any(|e| e.name == "GOOGLE_APPLICATION_CREDENTIALS"));
        assert!(spec.volumes.is_some());
    }

    #[test]
    fn driver_without_secret_skips_volume() {
        let (session, _server) = session_with_driver_and_server();
        let pod = build_pod(&session, &session.driver, &RuntimeConfig::default());
        assert!(pod.spec.unwrap().volumes.is_none());
    }
}
