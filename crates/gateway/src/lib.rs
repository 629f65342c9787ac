//! The only code path allowed to reach the remote statistics services.
//!
//! Requests are validated against the endpoint catalog before anything leaves the process;
//! the network itself sits behind the [`Transport`] seam so sessions can run against a
//! cache or a test double.

pub mod cache;
pub mod gateway;
pub mod params;
pub mod transport;

pub use cache::CachingTransport;
pub use gateway::{BaseUrls, CallRequest, CallResult, EndpointGateway, GatewayBuildError, PreparedCall};
pub use transport::{HttpTransport, RemoteRequest, Transport, TransportError};
