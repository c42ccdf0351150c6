//! The all-in-one scheduler server binary (spec §6.4): wires the cluster
//! API, controller and façade together behind the tonic scheduling service,
//! following the `CliArgs` + `#[tokio::main]` shape of
//! `control-plane/agents/core/src/server.rs`.

use cluster::{kube_api, pod_spec::RuntimeConfig, ClusterApi};
use grpc::server::SchedulingService;
use rpc::scheduling::scheduling_server::SchedulingServer;
use scheduler_agent::{Controller, ControllerOptions, Facade};
use std::{env, net::SocketAddr, sync::Arc, time::Duration};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = utils::package_info!())]
struct CliArgs {
    /// gRPC listen port (spec §6: "--port default 50051").
    #[structopt(long, default_value = "50051")]
    port: u16,

    /// Per-session deadline covering provisioning and run. `0s` disables
    /// the deadline (spec §6: "--testTimeout default 15 min").
    #[structopt(long, default_value = "15min")]
    test_timeout: humantime::Duration,

    /// How long `stop` waits for active executors to drain before giving
    /// up (spec §6: "--shutdownTimeout default 5 min").
    #[structopt(long, default_value = "5min")]
    shutdown_timeout: humantime::Duration,

    /// Cluster namespace pods are created/watched in.
    #[structopt(long, default_value = "default")]
    namespace: String,

    /// Number of sessions the controller runs concurrently.
    #[structopt(long, default_value = "1")]
    executor_count: usize,
}

fn test_timeout_from(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::from_args();
    utils::print_package_info!();
    utils::init_tracing("scheduler-agent");
    tracing::info!(?args, "starting scheduler-agent");

    if let Err(err) = run(args).await {
        eprintln!("scheduler-agent: {}", err);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = kube_api::discover_client().await?;
    let cluster: Arc<dyn ClusterApi> =
        Arc::new(kube_api::KubeClusterApi::new(client, args.namespace.clone()));

    let runtime = RuntimeConfig {
        gcp_key_secret: env::var("GCP_KEY_SECRET").ok(),
    };
    let options = ControllerOptions {
        executor_count: args.executor_count,
        test_timeout: test_timeout_from(args.test_timeout.into()),
        shutdown_timeout: args.shutdown_timeout.into(),
        runtime,
    };

    let store = Arc::new(common::store::Store::new());
    let watcher = cluster::PodWatcher::new();
    let controller = Controller::new(cluster, store.clone(), watcher, options);
    controller.start().await?;

    let facade = Arc::new(Facade::new(
        store,
        controller.clone(),
        env!("CARGO_PKG_VERSION"),
    ));
    let service = SchedulingServer::new(SchedulingService::new(facade));

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!(%addr, "scheduling service listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_shutdown(addr, shutdown)
        .await?;

    controller.stop().await?;
    Ok(())
}
