//! The data model from spec §3: `Component`, `Session`, `Pool`, `Event` and
//! the derived `Operation`.
//!
//! Newtype identifiers (`SessionName`, `ComponentName`, `PoolName`) follow the
//! `NodeId`/`PoolId` convention used for cluster identifiers in the teacher's
//! persistent-store types, so a pool name can never be passed where a session
//! name is expected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::{collections::HashMap, fmt};
use uuid::Uuid;

use crate::error::{SchedulingError, ValidationSnafu};
use snafu::ensure;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Borrows the identifier as a plain string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SessionName, "Globally unique name of a session within the store.");
string_id!(ComponentName, "Process-unique generated name of a single container.");
string_id!(PoolName, "Name of a labeled node pool.");

/// Kind of a component: the driver coordinates the run, workers do the work.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Driver,
    Server,
    Client,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::Driver => "driver",
            ComponentKind::Server => "server",
            ComponentKind::Client => "client",
        };
        f.write_str(s)
    }
}

/// A single container to be materialized on the cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Component {
    pub name: ComponentName,
    pub image: String,
    pub kind: ComponentKind,
    pub pool: PoolName,
    pub env: HashMap<String, String>,
}

impl Component {
    pub fn new(
        name: impl Into<ComponentName>,
        image: impl Into<String>,
        kind: ComponentKind,
        pool: impl Into<PoolName>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            kind,
            pool: pool.into(),
            env: HashMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A scheduling unit: one driver, N workers, an opaque scenario payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub name: SessionName,
    pub driver: Component,
    pub workers: Vec<Component>,
    pub scenario: Json,
    pub create_time: DateTime<Utc>,
}

impl Session {
    /// Builds a session, enforcing the invariants from spec §3:
    /// the driver must be of kind `Driver`, every worker must be a `Server`
    /// or `Client`, and all component names within the session are distinct.
    pub fn new(
        name: impl Into<SessionName>,
        driver: Component,
        workers: Vec<Component>,
        scenario: Json,
    ) -> Result<Self, SchedulingError> {
        ensure!(
            driver.kind == ComponentKind::Driver,
            ValidationSnafu {
                message: format!("driver component {} must have kind=driver", driver.name),
            }
        );
        for worker in &workers {
            ensure!(
                matches!(worker.kind, ComponentKind::Server | ComponentKind::Client),
                ValidationSnafu {
                    message: format!(
                        "worker component {} must have kind server or client",
                        worker.name
                    ),
                }
            );
        }
        let mut seen = std::collections::HashSet::new();
        seen.insert(driver.name.clone());
        for worker in &workers {
            ensure!(
                seen.insert(worker.name.clone()),
                ValidationSnafu {
                    message: format!("duplicate component name {} within session", worker.name),
                }
            );
        }

        Ok(Self {
            name: name.into(),
            driver,
            workers,
            scenario,
            create_time: Utc::now(),
        })
    }

    /// All components of the session, servers and clients first, driver last
    /// -- the provisioning order mandated by spec §4.5.
    pub fn components_in_provision_order(&self) -> Vec<&Component> {
        let mut servers: Vec<&Component> = self
            .workers
            .iter()
            .filter(|c| c.kind == ComponentKind::Server)
            .collect();
        let clients: Vec<&Component> = self
            .workers
            .iter()
            .filter(|c| c.kind == ComponentKind::Client)
            .collect();
        servers.extend(clients);
        servers.push(&self.driver);
        servers
    }

    /// The multiset of component counts grouped by pool name -- the
    /// reservation requirement consumed by the ledger (spec §4.2).
    pub fn pool_requirement(&self) -> HashMap<PoolName, usize> {
        let mut req: HashMap<PoolName, usize> = HashMap::new();
        *req.entry(self.driver.pool.clone()).or_default() += 1;
        for worker in &self.workers {
            *req.entry(worker.pool.clone()).or_default() += 1;
        }
        req
    }

    pub fn all_components(&self) -> impl Iterator<Item = &Component> {
        std::iter::once(&self.driver).chain(self.workers.iter())
    }
}

/// One component as supplied in a `startTestSession` request, before a
/// generated name has been assigned (spec §4.9 step 1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentRequest {
    pub image: String,
    pub kind: ComponentKind,
    pub pool: PoolName,
}

/// The wire-independent form of a `startTestSession` request (spec §6):
/// a scenario payload plus a driver and its workers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub scenario: Json,
    pub driver: ComponentRequest,
    pub workers: Vec<ComponentRequest>,
}

/// Generates a process-unique component name (spec §3: "stable generated
/// name, unique per process").
pub fn generate_component_name(prefix: &str) -> ComponentName {
    ComponentName::from(format!("{}-{}", prefix, Uuid::new_v4()))
}

/// Generates a globally unique session name.
pub fn generate_session_name() -> SessionName {
    SessionName::from(Uuid::new_v4().to_string())
}

/// A named set of interchangeable cluster nodes (spec §3/§4.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool {
    pub name: PoolName,
    pub capacity: usize,
    pub available: usize,
}

impl Pool {
    pub fn new(name: impl Into<PoolName>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            available: capacity,
        }
    }
}

/// The total order of session lifecycle event kinds (spec §3/§5).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Queue,
    Accept,
    Provision,
    Run,
    Done,
    Error,
    InternalError,
}

impl EventKind {
    /// `Done` and `Error` are terminal: no event follows them (invariant 4).
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::Done | EventKind::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One append-only lifecycle event for a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub subject: SessionName,
    pub kind: EventKind,
    pub time: DateTime<Utc>,
    pub description: String,
    pub driver_logs: Option<String>,
}

impl Event {
    pub fn new(subject: SessionName, kind: EventKind, description: impl Into<String>) -> Self {
        Self {
            subject,
            kind,
            time: Utc::now(),
            description: description.into(),
            driver_logs: None,
        }
    }

    pub fn with_driver_logs(mut self, logs: impl Into<String>) -> Self {
        self.driver_logs = Some(logs.into());
        self
    }
}

/// Failure status attached to a done-with-failure `Operation` (spec §4.8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureStatus {
    pub code: FailureCode,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FailureCode {
    Internal,
    Unknown,
}

/// Success payload attached to a done-with-`Done` `Operation`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuccessResult {
    pub driver_logs: String,
    /// Preserves the exact (buggy) formula from the source system: this is
    /// `session.create_time - event.time`, which is negative for any real
    /// run. See DESIGN.md Open Questions: fixing this would change
    /// observable output and is out of scope.
    pub elapsed: chrono::Duration,
}

/// Operation metadata: the latest event plus the service version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub latest_event: Option<Event>,
    pub service_version: String,
}

/// The externally visible projection over (session, latest event) (spec §3/§4.8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub metadata: OperationMetadata,
    pub success: Option<SuccessResult>,
    pub failure: Option<FailureStatus>,
}
