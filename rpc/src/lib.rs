//! Generated scheduling service types, following the teacher's
//! `tonic::include_proto!` module-per-proto layout.

/// Scheduling GRPC module for the autogenerated scheduling code.
pub mod scheduling {
    tonic::include_proto!("scheduling");
}
