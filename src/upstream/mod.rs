//! Throttled, retrying access to the shared Overpass service
//!
//! [`gateway::UpstreamGateway`] owns the retry and failover policy,
//! [`queue::RequestQueue`] spaces every call process-wide, and
//! [`transport::UpstreamTransport`] is the single HTTP exchange underneath.

pub mod gateway;
pub mod queue;
pub mod transport;

pub use gateway::UpstreamGateway;
pub use queue::RequestQueue;
pub use transport::{HttpTransport, UpstreamTransport};
