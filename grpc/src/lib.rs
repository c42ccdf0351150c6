//! The scheduling tonic service: wire conversions (spec §6), a
//! `tonic_build`-generated server implementation bridging to
//! `common::SchedulingFacade`, and a thin client wrapper for `test-ctl`,
//! following `control-plane/grpc`'s split between conversions,
//! server/client code and the generated proto modules.

pub mod client;
pub mod convert;
pub mod server;
pub mod status;

pub use rpc::scheduling;
