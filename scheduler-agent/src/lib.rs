//! The orchestration controller: queue intake, bounded executor pool,
//! session lifecycle state machine, and the gRPC-facing façade. The binary
//! entry point lives in `src/server.rs`.

pub mod config;
pub mod controller;
pub mod executor;
pub mod facade;

pub use config::ControllerOptions;
pub use controller::Controller;
pub use facade::Facade;
