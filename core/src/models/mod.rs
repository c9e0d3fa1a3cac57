//! Domain models
//!
//! - **resource**: bounded reusable resource pools
//! - **agent**: the unit of activity that holds resources
//! - **request**: resource request lifecycle
//! - **snapshot**: immutable point-in-time views

pub mod agent;
pub mod request;
pub mod resource;
pub mod snapshot;

/// Manager-assigned agent identifier.
pub type AgentId = u64;

/// Stable resource identifier.
pub type ResourceId = u64;

/// Monotonic request identifier.
pub type RequestId = u64;
