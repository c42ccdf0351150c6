//! `test-ctl`: the benchmark test client (spec §6.4). Starts a session from
//! driver/server/client image flags and a scenario payload, then long-polls
//! `GetOperation` until the session terminates, following the thin-wiring
//! role the spec reserves for this binary -- all the real work happens in
//! `grpc::client::SchedulingClient` and the wire types in `rpc`.

use common::ComponentKind;
use grpc::client::{ComponentArg, SchedulingClient};
use rpc::scheduling::{operation::Result as WireResult, Operation};
use std::time::Duration;
use structopt::StructOpt;

/// Exit codes from spec §6: 0 success, 2 flag error (handled by `structopt`
/// itself), 3 connection error, 4 scheduling error, 5 operation-polling
/// error.
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const CONNECTION: i32 = 3;
    pub const SCHEDULING: i32 = 4;
    pub const POLLING: i32 = 5;
}

#[derive(Debug, StructOpt)]
#[structopt(name = utils::package_info!())]
struct CliArgs {
    /// Address of the scheduling gRPC service, e.g. http://localhost:50051.
    #[structopt(long)]
    address: String,

    /// Driver container image.
    #[structopt(long)]
    driver: String,

    /// Pool the driver is scheduled onto.
    #[structopt(long, default_value = "default")]
    driver_pool: String,

    /// Server container image.
    #[structopt(long)]
    server: String,

    /// Pool server components are scheduled onto.
    #[structopt(long, default_value = "default")]
    server_pool: String,

    /// Client container image; may be repeated for multiple client workers.
    #[structopt(long)]
    client: Vec<String>,

    /// Pool client components are scheduled onto.
    #[structopt(long, default_value = "default")]
    client_pool: String,

    /// Opaque scenario payload as a JSON object.
    #[structopt(long, default_value = "{}")]
    scenario: String,

    /// How often to poll `GetOperation` while the session runs.
    #[structopt(long, default_value = "2s")]
    poll_interval: humantime::Duration,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::from_args();
    utils::init_tracing("test-ctl");

    if let Err(err) = serde_json::from_str::<serde_json::Value>(&args.scenario) {
        eprintln!("test-ctl: --scenario is not valid JSON: {}", err);
        std::process::exit(exit_code::SCHEDULING);
    }

    let mut client = match SchedulingClient::connect(args.address.clone()).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("test-ctl: failed to connect to {}: {}", args.address, err);
            std::process::exit(exit_code::CONNECTION);
        }
    };

    let driver = ComponentArg {
        image: args.driver.clone(),
        kind: ComponentKind::Driver,
        pool: args.driver_pool.clone(),
    };
    let mut workers = vec![ComponentArg {
        image: args.server.clone(),
        kind: ComponentKind::Server,
        pool: args.server_pool.clone(),
    }];
    workers.extend(args.client.iter().map(|image| ComponentArg {
        image: image.clone(),
        kind: ComponentKind::Client,
        pool: args.client_pool.clone(),
    }));

    let operation = match client
        .start_test_session(args.scenario.clone(), driver, workers)
        .await
    {
        Ok(operation) => operation,
        Err(err) => {
            eprintln!("test-ctl: failed to start test session: {}", err);
            std::process::exit(exit_code::SCHEDULING);
        }
    };

    println!("started {}", operation.name);
    let poll_interval: Duration = args.poll_interval.into();

    let mut current = operation;
    while !current.done {
        tokio::time::sleep(poll_interval).await;
        current = match client.get_operation(current.name.clone()).await {
            Ok(operation) => operation,
            Err(err) => {
                eprintln!("test-ctl: failed to poll operation: {}", err);
                std::process::exit(exit_code::POLLING);
            }
        };
        if let Some(metadata) = &current.metadata {
            if metadata.has_latest_event {
                println!("  {} -- {}", metadata.event_kind, metadata.event_description);
            }
        }
    }

    std::process::exit(report(current));
}

fn report(operation: Operation) -> i32 {
    match operation.result {
        Some(WireResult::Success(success)) => {
            // `elapsed_millis` preserves the source system's exact (and
            // backwards) sign convention; see SuccessResult in rpc/proto.
            println!("session succeeded, elapsed_millis={}", success.elapsed_millis);
            println!("--- driver logs ---\n{}", success.driver_logs);
            exit_code::SUCCESS
        }
        Some(WireResult::Failure(failure)) => {
            eprintln!("session failed (code {}): {}", failure.code, failure.message);
            exit_code::SCHEDULING
        }
        None => {
            eprintln!("test-ctl: operation finished with no result payload");
            exit_code::SCHEDULING
        }
    }
}
