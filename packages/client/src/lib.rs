//! Client stubs for APIs declared with `keel`.
//!
//! An [`ApiClient`] is built from the same [`keel::EndpointTable`] the server
//! routes with, so every stub it hands out matches a real endpoint. Calls go
//! through a [`Transport`]; [`HttpTransport`] is the `reqwest` implementation.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiClient, Args, Resource, Stub};
pub use error::ClientError;
pub use transport::{HttpTransport, Transport, TransportError, WireRequest, WireResponse};
