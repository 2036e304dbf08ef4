//! Generated gRPC bindings for the `tripify.v1` contract.

pub mod v1 {
    tonic::include_proto!("tripify.v1");
}
