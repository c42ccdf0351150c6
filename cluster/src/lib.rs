//! The cluster interfaces consumed by the scheduler core (spec §6.2): pod
//! create/delete/get-logs, pod watch, node listing. The teacher treats the
//! cluster API client as a narrow seam (`common-lib`'s `kube`/`k8s-openapi`
//! dependencies are only ever reached through small wrapper types); this
//! crate is that seam.
//!
//! [`api::ClusterApi`] is the trait the rest of the workspace programs
//! against. [`kube_api::KubeClusterApi`] is the one real implementation.
//! [`fake::FakeClusterApi`] is an in-memory test double used to drive the
//! end-to-end scenarios in spec §8 without a live cluster.

pub mod api;
pub mod convert;
pub mod fake;
pub mod health;
pub mod kube_api;
pub mod pod_spec;
pub mod watcher;

pub use api::{ClusterApi, ClusterError, NodeInfo};
pub use health::{ContainerStateView, ContainerStatusView, Health};
pub use watcher::{PodWatchEvent, PodWatcher, WatcherError};
