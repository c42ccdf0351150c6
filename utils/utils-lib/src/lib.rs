//! Small ambient helpers shared by every scheduler binary: tracing
//! initialization and a version banner, split out the way the teacher keeps
//! this kind of thing in its own `utils` crate rather than duplicated per
//! binary.

use tracing_subscriber::{fmt, EnvFilter};

/// Default gRPC listen address used by the scheduler server binary.
pub const DEFAULT_GRPC_SERVER_ADDR: &str = "0.0.0.0:50051";

/// Installs a `tracing` subscriber that reads `RUST_LOG` (defaulting to
/// `info`) and writes structured, timestamped lines to stdout.
///
/// `service` is recorded so log lines from the agent, the driver binary and
/// test-ctl can be told apart when aggregated.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_target(true).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // A subscriber is already installed (e.g. set up by a test harness).
        tracing::debug!(service, "tracing subscriber already initialized");
    }
}

/// Prints a `<name> <version>` banner the way every agent binary does at
/// startup, before logging is configured.
#[macro_export]
macro_rules! print_package_info {
    () => {
        println!(
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
    };
}

/// A package's `name version` string, usable as a `structopt` `version`
/// attribute.
#[macro_export]
macro_rules! package_info {
    () => {
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
    };
}
