//! Generated gRPC bindings for the `shorturl.v1` service.

pub mod shorturl {
    pub mod v1 {
        tonic::include_proto!("shorturl.v1");
    }
}

pub mod v1 {
    pub use crate::shorturl::v1::*;
}
