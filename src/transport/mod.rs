//! HTTP transport for the `api` action.

pub mod http;

pub use http::{ReqwestApiClient, TransportError};
