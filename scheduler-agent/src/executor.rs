//! Per-session executor state machine (spec §4.5): Accept -> Provision ->
//! Run -> Cleanup. One executor owns exactly one session from the moment it
//! is dequeued until `done`/`unsubscribe` have both run -- guaranteed even
//! on panic by [`ExecutorGuard`], grounded in the reconciler-state-machine
//! shape the teacher uses for per-resource work, just with an explicit
//! guard type in place of the teacher's `OperationGuardArc` drop glue.

use crate::config::ControllerOptions;
use cluster::{
    pod_spec::{self, RuntimeConfig},
    ClusterApi, Health, PodWatchEvent, PodWatcher,
};
use common::{
    error::{ClusterSnafu, ProvisioningSnafu, TestSnafu, TimeoutSnafu},
    queue::WaitQueue,
    store::Store,
    types::{ComponentKind, Event, EventKind, Session, SessionName},
    SchedulingError,
};
use snafu::ResultExt;
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tracing::{info, warn};

/// Everything one executor needs, cloned cheaply out of the controller.
#[derive(Clone)]
pub struct ExecutorDeps {
    pub cluster: Arc<dyn ClusterApi>,
    pub store: Arc<Store>,
    pub watcher: PodWatcher,
    pub queue: Arc<WaitQueue>,
    pub runtime: RuntimeConfig,
    pub test_timeout: Option<Duration>,
}

impl ExecutorDeps {
    pub fn from_options(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<Store>,
        watcher: PodWatcher,
        queue: Arc<WaitQueue>,
        options: &ControllerOptions,
    ) -> Self {
        Self {
            cluster,
            store,
            watcher,
            queue,
            runtime: options.runtime.clone(),
            test_timeout: options.test_timeout,
        }
    }
}

/// Releases the queue reservation and the watcher subscription for a
/// session no matter how the executor task exits -- return, early return or
/// panic (spec §4.5: "Both must happen even on panic").
struct ExecutorGuard {
    queue: Arc<WaitQueue>,
    watcher: PodWatcher,
    session: Session,
    // Held only to be dropped alongside the guard, freeing the executor's
    // concurrency slot exactly when the session's resources are released.
    _permit: OwnedSemaphorePermit,
}

impl Drop for ExecutorGuard {
    fn drop(&mut self) {
        self.queue.done(&self.session);
        self.watcher.unsubscribe(&self.session.name);
    }
}

/// Runs one session to completion: Accept, Provision, Run, Cleanup. Never
/// panics on an expected error path; any unexpected panic still releases
/// the reservation and the watch subscription via `ExecutorGuard`.
pub async fn run(session: Session, deps: ExecutorDeps, permit: OwnedSemaphorePermit) {
    let name = session.name.clone();
    info!(%name, "executor accepted session");
    record_event(&deps.store, &name, EventKind::Accept, "session accepted");

    let mut rx = match deps.watcher.subscribe(name.clone()) {
        Ok(rx) => rx,
        Err(err) => {
            // No subscription exists yet; nothing to unsubscribe, so a
            // guard would double-unsubscribe harmlessly, but we still need
            // `done` to run -- build one regardless.
            let guard = ExecutorGuard {
                queue: deps.queue.clone(),
                watcher: deps.watcher.clone(),
                session: session.clone(),
                _permit: permit,
            };
            record_event(
                &deps.store,
                &name,
                EventKind::Error,
                format!("failed to subscribe to pod watch: {}", err),
            );
            drop(guard);
            return;
        }
    };
    let guard = ExecutorGuard {
        queue: deps.queue.clone(),
        watcher: deps.watcher.clone(),
        session: session.clone(),
        _permit: permit,
    };

    record_event(
        &deps.store,
        &name,
        EventKind::Provision,
        "provisioning session components",
    );
    let provisioned = with_timeout(
        deps.test_timeout,
        provision(&session, deps.cluster.as_ref(), &mut rx, &deps.runtime),
        &name,
        "provisioning",
    )
    .await;

    let outcome = match provisioned {
        Ok(()) => {
            record_event(&deps.store, &name, EventKind::Run, "monitoring session run");
            with_timeout(deps.test_timeout, monitor(&name, &mut rx), &name, "run").await
        }
        Err(err) => Err(err),
    };

    cleanup(&deps, &session, outcome).await;
    drop(guard);
}

async fn with_timeout<F>(
    deadline: Option<Duration>,
    fut: F,
    session: &SessionName,
    phase: &str,
) -> Result<(), SchedulingError>
where
    F: std::future::Future<Output = Result<(), SchedulingError>>,
{
    match deadline {
        Some(duration) => tokio::time::timeout(duration, fut).await.unwrap_or_else(|_| {
            TimeoutSnafu {
                session: session.clone(),
                message: format!("{} did not complete before the test timeout", phase),
            }
            .fail()
        }),
        None => fut.await,
    }
}

/// Provisions every component, servers then clients then the driver (spec
/// §4.5): the driver is last because its `QPS_WORKERS` environment variable
/// needs every worker endpoint, which is only known once each worker has
/// reported `Ready` with an IP.
async fn provision(
    session: &Session,
    cluster: &dyn ClusterApi,
    rx: &mut mpsc::Receiver<PodWatchEvent>,
    runtime: &RuntimeConfig,
) -> Result<(), SchedulingError> {
    let mut worker_endpoints = Vec::new();

    for component in session.components_in_provision_order() {
        let built = if component.kind == ComponentKind::Driver {
            component
                .clone()
                .with_env("QPS_WORKERS", worker_endpoints.join(","))
        } else {
            component.clone()
        };

        let pod = pod_spec::build_pod(session, &built, runtime);
        cluster
            .create_pod(pod)
            .await
            .map_err(|err| {
                ProvisioningSnafu {
                    session: session.name.clone(),
                    message: format!("failed to create pod for {}: {}", component.name, err),
                }
                .build()
            })?;

        loop {
            let event = rx.recv().await.ok_or_else(|| {
                ClusterSnafu {
                    message: "pod watch channel closed during provisioning".to_string(),
                }
                .build()
            })?;
            if event.component != component.name {
                continue;
            }
            match event.health {
                Health::Ready if event.pod_ip.is_some() => {
                    let ip = event.pod_ip.expect("checked Some above");
                    let endpoint = format!("{}:{}", ip, pod_spec::DRIVER_PORT);
                    if component.kind != ComponentKind::Driver {
                        worker_endpoints.push(endpoint);
                    }
                    break;
                }
                Health::Failed { reason, message } => {
                    return ProvisioningSnafu {
                        session: session.name.clone(),
                        message: format!(
                            "component {} failed during provisioning: {}",
                            component.name,
                            message.or(reason).unwrap_or_default()
                        ),
                    }
                    .fail();
                }
                // Other health values (Unknown, NotReady, waiting without
                // crash-loop) are ignored; the component stays pending.
                _ => {}
            }
        }
    }
    Ok(())
}

/// Consumes watch events until any component succeeds or fails (spec
/// §4.5). Intermediate transitions are informational.
async fn monitor(
    name: &SessionName,
    rx: &mut mpsc::Receiver<PodWatchEvent>,
) -> Result<(), SchedulingError> {
    loop {
        let event = rx.recv().await.ok_or_else(|| {
            ClusterSnafu {
                message: "pod watch channel closed during run".to_string(),
            }
            .build()
        })?;
        match event.health {
            Health::Succeeded => return Ok(()),
            Health::Failed { reason, message } => {
                return TestSnafu {
                    session: name.clone(),
                    message: format!(
                        "component {} failed: {}",
                        event.component,
                        message.or(reason).unwrap_or_default()
                    ),
                }
                .fail();
            }
            _ => {}
        }
    }
}

/// Unconditional teardown (spec §4.5): best-effort log fetch, pod deletion,
/// then the terminal `Done`/`Error` event. Cleanup failures become
/// `InternalError` events and never mask the primary outcome.
async fn cleanup(deps: &ExecutorDeps, session: &Session, outcome: Result<(), SchedulingError>) {
    let name = &session.name;

    let driver_logs = match deps.cluster.get_logs(session.driver.name.as_str()).await {
        Ok(logs) => logs,
        Err(err) => {
            record_event(
                &deps.store,
                name,
                EventKind::InternalError,
                format!("failed to fetch driver logs: {}", err),
            );
            String::new()
        }
    };

    if let Err(err) = deps.cluster.delete_session_pods(name).await {
        record_event(
            &deps.store,
            name,
            EventKind::InternalError,
            format!("failed to delete session pods: {}", err),
        );
    }

    match outcome {
        Ok(()) => record_event_with_logs(
            &deps.store,
            name,
            EventKind::Done,
            "session completed successfully",
            driver_logs,
        ),
        Err(err) => {
            warn!(%name, %err, "session terminated with an error");
            record_event_with_logs(&deps.store, name, EventKind::Error, err.to_string(), driver_logs)
        }
    }
}

fn record_event(store: &Store, name: &SessionName, kind: EventKind, description: impl Into<String>) {
    let event = Event::new(name.clone(), kind, description);
    if let Err(err) = store.store_event(name, event) {
        warn!(%name, %err, "failed to record session event");
    }
}

fn record_event_with_logs(
    store: &Store,
    name: &SessionName,
    kind: EventKind,
    description: impl Into<String>,
    logs: String,
) {
    let event = Event::new(name.clone(), kind, description).with_driver_logs(logs);
    if let Err(err) = store.store_event(name, event) {
        warn!(%name, %err, "failed to record session event");
    }
}
