//! Error types
//!
//! One kind per failure condition. Request outcomes (`Denied`, `TimedOut`,
//! `Cancelled`) are values, not errors; these kinds cover malformed or
//! impossible calls only.

use thiserror::Error;

use crate::models::{AgentId, ResourceId};

/// Errors surfaced by manager operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WardenError {
    #[error("agent {0} is not registered")]
    AgentNotFound(AgentId),

    #[error("resource {0} is not registered")]
    ResourceNotFound(ResourceId),

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error(
        "max claim exceeded for agent {agent} on resource {resource}: \
         requested total {requested} > declared max {declared}"
    )]
    MaxClaimExceeded {
        agent: AgentId,
        resource: ResourceId,
        requested: u64,
        declared: u64,
    },

    #[error("resource {resource} capacity exceeded: requested {requested} > capacity {capacity}")]
    ResourceCapacityExceeded {
        resource: ResourceId,
        requested: u64,
        capacity: u64,
    },

    #[error("pending queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("agent name '{name}' is already registered")]
    AgentAlreadyRegistered { name: String },
}

/// Convenience alias used throughout the crate
pub type WardenResult<T> = Result<T, WardenError>;
