//! Ingestion endpoint reachability monitoring.
//!
//! The [`EndpointHealthMonitor`] probes an endpoint on a fixed interval
//! and exposes the most recently completed probe's result, together
//! with an ordered list of fallback endpoints the operator can switch
//! to. Its lifecycle is independent of any broadcast session.

mod error;
mod monitor;
mod probe;

pub use error::HealthError;
pub use monitor::{EndpointHealthMonitor, EndpointHealthState, ProbeStatus, DEFAULT_PROBE_INTERVAL};
pub use probe::{EndpointProbe, HttpEndpointProbe};
