//! Controller configuration (spec §4.6/§6): concurrency cap, per-session
//! test timeout, shutdown deadline, and the pod-building runtime config
//! threaded down from `cluster::pod_spec`.

use cluster::pod_spec::RuntimeConfig;
use std::time::Duration;

/// Default number of sessions the controller runs concurrently (spec
/// §4.6: "executorCount (default 1)").
pub const DEFAULT_EXECUTOR_COUNT: usize = 1;
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How long the poll loop sleeps when the queue is empty or the
/// concurrency cap is reached (spec §4.6: "sleep ~5s and retry").
pub const POLL_IDLE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ControllerOptions {
    pub executor_count: usize,
    /// `None` means unbounded (spec §4.6: "testTimeout ... zero = unbounded").
    pub test_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub runtime: RuntimeConfig,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            executor_count: DEFAULT_EXECUTOR_COUNT,
            test_timeout: Some(DEFAULT_TEST_TIMEOUT),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            runtime: RuntimeConfig::default(),
        }
    }
}
