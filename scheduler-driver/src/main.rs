//! The production scheduler driver (spec §1/§6): the binary that actually
//! runs inside the cluster it schedules onto. Unlike the `scheduler-agent`
//! all-in-one development binary, it never reads `KUBE_CONFIG_FILE` --
//! spec §6 marks that variable "development binaries only" -- and always
//! builds its cluster client via in-cluster discovery.

use cluster::{kube_api::KubeClusterApi, pod_spec::RuntimeConfig, ClusterApi};
use grpc::server::SchedulingService;
use rpc::scheduling::scheduling_server::SchedulingServer;
use scheduler_agent::{Controller, ControllerOptions, Facade};
use std::{env, net::SocketAddr, sync::Arc, time::Duration};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = utils::package_info!())]
struct CliArgs {
    #[structopt(long, default_value = "50051")]
    port: u16,

    #[structopt(long, default_value = "15min")]
    test_timeout: humantime::Duration,

    #[structopt(long, default_value = "5min")]
    shutdown_timeout: humantime::Duration,

    #[structopt(long, default_value = "default")]
    namespace: String,

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
    utils::init_tracing("scheduler-driver");
    tracing::info!(?args, "starting scheduler-driver");

    if let Err(err) = run(args).await {
        eprintln!("scheduler-driver: {}", err);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = kube::Client::try_default().await?;
    let cluster: Arc<dyn ClusterApi> =
        Arc::new(KubeClusterApi::new(client, args.namespace.clone()));

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
