//! The controller (spec §4.6): start/stop, concurrency bound, queue
//! polling. Mirrors the teacher's core-agent `Service` in spirit -- a long
//! -lived object owning the reconciliation loop -- but the loop here drives
//! session executors instead of resource reconcilers.

use crate::{config::ControllerOptions, executor, executor::ExecutorDeps};
use cluster::{kube_api, ClusterApi, PodWatcher};
use common::{
    error::NotRunningSnafu,
    ledger::ReservationLedger,
    pool::PoolRegistry,
    queue::{DequeueOutcome, WaitQueue},
    store::Store,
    types::{Event, EventKind, ReservationError, Session},
    SchedulingError,
};
use parking_lot::RwLock;
use snafu::ensure;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Semaphore;
use tracing::warn;

pub struct Controller {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<Store>,
    watcher: PodWatcher,
    queue: RwLock<Option<Arc<WaitQueue>>>,
    running: AtomicBool,
    semaphore: Arc<Semaphore>,
    options: ControllerOptions,
}

impl Controller {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<Store>,
        watcher: PodWatcher,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(options.executor_count));
        Arc::new(Self {
            cluster,
            store,
            watcher,
            queue: RwLock::new(None),
            running: AtomicBool::new(false),
            semaphore,
            options,
        })
    }

    /// Discovers pools, builds the registry/ledger/queue, starts the
    /// watcher and the poll loop (spec §4.6).
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulingError> {
        let pools = kube_api::discover_pools(self.cluster.as_ref())
            .await
            .map_err(|err| SchedulingError::Cluster {
                message: err.to_string(),
            })?;
        let mut registry = PoolRegistry::new();
        for (pool, node_count) in pools {
            registry.register(pool, node_count);
        }
        let queue = Arc::new(WaitQueue::new(ReservationLedger::new(registry)));
        *self.queue.write() = Some(queue.clone());

        self.watcher
            .start(self.cluster.clone())
            .await
            .map_err(|err| SchedulingError::Cluster {
                message: err.to_string(),
            })?;

        self.running.store(true, Ordering::SeqCst);

        let controller = self.clone();
        tokio::spawn(async move { controller.poll_loop(queue).await });
        Ok(())
    }

    /// Rejects sessions when not running; otherwise records `Queue` and
    /// enqueues (spec §4.6).
    pub fn schedule(&self, session: Session) -> Result<(), SchedulingError> {
        ensure!(self.running.load(Ordering::SeqCst), NotRunningSnafu);
        let queue = self
            .queue
            .read()
            .clone()
            .ok_or(SchedulingError::NotRunning)?;
        self.store.store_event(
            &session.name,
            Event::new(session.name.clone(), EventKind::Queue, "session queued"),
        )?;
        queue.enqueue(session);
        Ok(())
    }

    /// Stops accepting new work and waits for active executors to drain,
    /// then always stops the watcher (spec §4.6). Draining holds every
    /// permit at once (rather than re-acquiring one at a time, which would
    /// be satisfied by a single free slot cycling through the loop without
    /// ever proving all executors have returned) so the wait genuinely
    /// blocks until no executor is still running.
    pub async fn stop(&self) -> Result<(), SchedulingError> {
        self.running.store(false, Ordering::SeqCst);

        let semaphore = self.semaphore.clone();
        let executor_count = self.options.executor_count as u32;
        let drain = semaphore.acquire_many_owned(executor_count);
        let result = tokio::time::timeout(self.options.shutdown_timeout, drain).await;

        self.watcher.stop();
        match result {
            Ok(Ok(_permits)) => Ok(()),
            Ok(Err(_closed)) => Ok(()),
            Err(_elapsed) => Err(SchedulingError::StopTimeout),
        }
    }

    /// While running, attempt to dequeue a session below the concurrency
    /// cap; otherwise sleep and retry (spec §4.6). The cap is checked
    /// *before* dequeuing, so a session is never pulled off the queue
    /// (and reserved) only to find no executor slot free.
    async fn poll_loop(self: Arc<Self>, queue: Arc<WaitQueue>) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tokio::time::sleep(crate::config::POLL_IDLE_INTERVAL).await;
                    continue;
                }
            };

            match queue.dequeue() {
                DequeueOutcome::Ready(session) => {
                    let deps = ExecutorDeps::from_options(
                        self.cluster.clone(),
                        self.store.clone(),
                        self.watcher.clone(),
                        queue.clone(),
                        &self.options,
                    );
                    tokio::spawn(executor::run(session, deps, permit));
                    // The cap is advisory: loop again immediately rather
                    // than sleeping after a successful spawn.
                }
                DequeueOutcome::Unschedulable(session, err) => {
                    // No reservation was ever made for this session, so
                    // `queue.done` (which releases one) must not be called.
                    drop(permit);
                    self.record_unschedulable(&session, err);
                }
                DequeueOutcome::Empty => {
                    drop(permit);
                    tokio::time::sleep(crate::config::POLL_IDLE_INTERVAL).await;
                }
            }
        }
    }

    fn record_unschedulable(&self, session: &Session, err: ReservationError) {
        let event = Event::new(
            session.name.clone(),
            EventKind::Error,
            format!("session can never fit cluster capacity: {}", err),
        );
        if let Err(store_err) = self.store.store_event(&session.name, event) {
            warn!(session = %session.name, %store_err, "failed to record unschedulable session event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::{api::NodeInfo, fake::FakeClusterApi};
    use common::types::{Component, ComponentKind};
    use serde_json::json;

    fn session(name: &str, pool: &str) -> Session {
        let driver = Component::new(format!("{}-driver", name), "img", ComponentKind::Driver, pool);
        Session::new(name, driver, vec![], json!({})).unwrap()
    }

    fn fake_cluster(pool: &str, capacity: usize) -> Arc<FakeClusterApi> {
        FakeClusterApi::new(vec![
            NodeInfo {
                name: "node-0".to_string(),
                pool: Some(pool.to_string()),
            };
            capacity
        ])
    }

    fn controller_with(cluster: Arc<FakeClusterApi>, store: Arc<Store>) -> Arc<Controller> {
        Controller::new(cluster, store, PodWatcher::new(), ControllerOptions::default())
    }

    #[tokio::test]
    async fn schedule_before_start_is_rejected() {
        let controller = controller_with(fake_cluster("p", 1), Arc::new(Store::new()));
        let err = controller.schedule(session("s", "p")).unwrap_err();
        assert!(matches!(err, SchedulingError::NotRunning));
    }

    #[tokio::test]
    async fn start_then_schedule_enqueues_and_records_queue_event() {
        let store = Arc::new(Store::new());
        let controller = controller_with(fake_cluster("p", 1), store.clone());
        controller.start().await.unwrap();
        store.store_session(session("s", "p")).unwrap();
        controller.schedule(session("s", "p")).unwrap();

        let events = store.get_events(&common::SessionName::from("s")).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind, EventKind::Queue));
    }

    /// Scenario 4 (spec §8): `stop` called while an executor is still
    /// blocked past the shutdown deadline returns a timeout error, and the
    /// controller transitions to not-running regardless -- a later
    /// `schedule` call must then fail.
    #[tokio::test]
    async fn stop_times_out_while_an_executor_is_still_blocked() {
        let store = Arc::new(Store::new());
        let options = ControllerOptions {
            // Unbounded per-session deadline: nothing ever makes the
            // executor's provisioning wait return on its own.
            test_timeout: None,
            shutdown_timeout: std::time::Duration::from_millis(50),
            ..ControllerOptions::default()
        };
        let controller = Controller::new(fake_cluster("p", 1), store.clone(), PodWatcher::new(), options);
        controller.start().await.unwrap();

        let s = session("s", "p");
        store.store_session(s.clone()).unwrap();
        controller.schedule(s).unwrap();

        // Give the poll loop a moment to dequeue and spawn the executor,
        // which then blocks forever waiting for a pod-ready event that
        // never arrives.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, SchedulingError::StopTimeout));
        assert!(!controller.running.load(Ordering::SeqCst));

        let err = controller.schedule(session("s2", "p")).unwrap_err();
        assert!(matches!(err, SchedulingError::NotRunning));
    }
}
