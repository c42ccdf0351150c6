//! Single cluster-wide pod watch, demultiplexed by session (spec §4.4).
//!
//! One `PodWatcher` owns exactly one upstream watch stream; `subscribe`
//! hands out a bounded per-session channel and `publish` (driven by the
//! internal loop) fans events out to the right one. Publishing never
//! blocks: a full or closed subscriber channel just drops the event with a
//! warning, so a slow or absent consumer can never stall the watch loop.

use crate::{
    api::{ClusterApi, ClusterError},
    convert,
    health::{self, Health},
};
use common::types::{ComponentName, SessionName};
use parking_lot::Mutex;
use snafu::Snafu;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Default bound on in-flight events per subscriber (spec §4.4).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Snafu, Clone)]
pub enum WatcherError {
    #[snafu(display("session {} is already subscribed", session))]
    AlreadySubscribed { session: SessionName },

    #[snafu(display("failed to start cluster watch: {}", source))]
    Start { source: ClusterError },
}

/// One pod health transition, demultiplexed to its owning session.
#[derive(Clone, Debug)]
pub struct PodWatchEvent {
    pub session: SessionName,
    pub component: ComponentName,
    pub pod_name: String,
    pub pod_ip: Option<String>,
    pub health: Health,
}

struct Shared {
    subscribers: Mutex<HashMap<SessionName, mpsc::Sender<PodWatchEvent>>>,
}

/// The fanout itself. Cloning shares the subscriber table and running loop.
#[derive(Clone)]
pub struct PodWatcher {
    shared: Arc<Shared>,
    quit: Arc<tokio::sync::Notify>,
    channel_capacity: usize,
}

impl PodWatcher {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(HashMap::new()),
            }),
            quit: Arc::new(tokio::sync::Notify::new()),
            channel_capacity,
        }
    }

    /// Starts the watch loop as a background task. `cluster` provides the
    /// single upstream watch stream this instance fans out from.
    pub async fn start(
        &self,
        cluster: Arc<dyn ClusterApi>,
    ) -> Result<tokio::task::JoinHandle<()>, WatcherError> {
        let mut stream = cluster.watch_pods().await.context_start()?;
        let shared = self.shared.clone();
        let quit = self.quit.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = quit.notified() => {
                        info!("pod watcher stop signal received, exiting watch loop");
                        break;
                    }
                    next = stream.next() => {
                        match next {
                            Some(pod) => dispatch(&shared, pod),
                            None => {
                                info!("upstream pod watch closed, exiting watch loop");
                                break;
                            }
                        }
                    }
                }
            }
        }))
    }

    /// Closes the quit channel and the upstream watch; the internal loop
    /// exits on either signal. After `stop`, no further events are
    /// published (spec §4.4).
    pub fn stop(&self) {
        self.quit.notify_waiters();
    }

    /// Registers a new subscriber channel for `session`. A second subscribe
    /// for the same name fails.
    pub fn subscribe(
        &self,
        session: SessionName,
    ) -> Result<mpsc::Receiver<PodWatchEvent>, WatcherError> {
        let mut subscribers = self.shared.subscribers.lock();
        if subscribers.contains_key(&session) {
            return AlreadySubscribedSnafu { session }.fail();
        }
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        subscribers.insert(session, tx);
        Ok(rx)
    }

    /// Closes and removes the channel for `session`, if any.
    pub fn unsubscribe(&self, session: &SessionName) {
        self.shared.subscribers.lock().remove(session);
    }
}

impl Default for PodWatcher {
    fn default() -> Self {
        Self::new()
    }
}

trait ResultExt<T> {
    fn context_start(self) -> Result<T, WatcherError>;
}

impl<T> ResultExt<T> for Result<T, ClusterError> {
    fn context_start(self) -> Result<T, WatcherError> {
        self.map_err(|source| WatcherError::Start { source })
    }
}

fn dispatch(shared: &Shared, pod: k8s_openapi::api::core::v1::Pod) {
    let labels = convert::labels(&pod);
    let session = match labels.get("session-name") {
        Some(name) => SessionName::from(name.as_str()),
        // Pods without a session-name label are ignored (spec §4.4).
        None => return,
    };
    let component = labels
        .get("component-name")
        .map(|name| ComponentName::from(name.as_str()))
        .unwrap_or_default();

    let statuses = convert::container_statuses_view(&pod);
    let health = health::classify(&statuses);
    let pod_name = convert::pod_name(&pod).unwrap_or_default();
    let pod_ip = convert::pod_ip(&pod);

    let event = PodWatchEvent {
        session: session.clone(),
        component,
        pod_name,
        pod_ip,
        health,
    };

    let subscribers = shared.subscribers.lock();
    match subscribers.get(&session) {
        Some(tx) => {
            if let Err(err) = tx.try_send(event) {
                warn!(%session, "dropping pod watch event, subscriber channel {}", match err {
                    mpsc::error::TrySendError::Full(_) => "full",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                });
            }
        }
        // Events for a session with no subscriber are dropped (spec §4.4).
        None => {}
    }
}
