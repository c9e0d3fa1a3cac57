//! Resource model
//!
//! Represents a bounded, discrete, reusable supply that agents compete for.
//! Each resource has:
//! - Stable integer identity and human-readable name
//! - Category tag (API rate limit, token budget, tool slot, ...)
//! - Total capacity and currently available units
//!
//! CRITICAL: `0 <= available <= total_capacity` at all times.

use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::models::ResourceId;

/// Category tag for a resource
///
/// Closed set; `Custom` covers anything the built-in categories do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    ApiRateLimit,
    TokenBudget,
    ToolSlot,
    MemoryPool,
    DatabaseConn,
    GpuCompute,
    FileHandle,
    NetworkSocket,
    Custom,
}

/// A named, categorized, discrete, reusable, bounded supply
///
/// # Example
/// ```
/// use agent_warden_core_rs::{Resource, ResourceCategory};
///
/// let res = Resource::new(1, "openai_api".to_string(), ResourceCategory::ApiRateLimit, 10);
/// assert_eq!(res.total_capacity(), 10);
/// assert_eq!(res.available(), 10);
/// assert_eq!(res.allocated(), 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Stable identifier, unique within a manager
    id: ResourceId,

    /// Human-readable name (e.g., "openai_api")
    name: String,

    /// Category tag
    category: ResourceCategory,

    /// Total capacity in units
    total_capacity: u64,

    /// Units currently available for granting
    available: u64,
}

impl Resource {
    /// Create a new resource with all units available
    ///
    /// # Example
    /// ```
    /// use agent_warden_core_rs::{Resource, ResourceCategory};
    ///
    /// let res = Resource::new(7, "gpu_pool".to_string(), ResourceCategory::GpuCompute, 4);
    /// assert_eq!(res.id(), 7);
    /// assert_eq!(res.name(), "gpu_pool");
    /// ```
    pub fn new(id: ResourceId, name: String, category: ResourceCategory, capacity: u64) -> Self {
        Self {
            id,
            name,
            category,
            total_capacity: capacity,
            available: capacity,
        }
    }

    /// Get resource ID
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get category tag
    pub fn category(&self) -> ResourceCategory {
        self.category
    }

    /// Get total capacity in units
    pub fn total_capacity(&self) -> u64 {
        self.total_capacity
    }

    /// Get units currently available
    pub fn available(&self) -> u64 {
        self.available
    }

    /// Units currently held by agents
    pub fn allocated(&self) -> u64 {
        self.total_capacity - self.available
    }

    /// Fraction of capacity in use, in `[0, 1]`
    ///
    /// Zero-capacity resources report zero utilization.
    pub fn utilization(&self) -> f64 {
        if self.total_capacity == 0 {
            0.0
        } else {
            1.0 - (self.available as f64 / self.total_capacity as f64)
        }
    }

    /// Take `quantity` units out of availability
    ///
    /// Caller must have verified `quantity <= available`.
    pub(crate) fn reserve(&mut self, quantity: u64) {
        debug_assert!(quantity <= self.available, "reserve exceeds availability");
        self.available -= quantity;
    }

    /// Return `quantity` units to availability
    pub(crate) fn restore(&mut self, quantity: u64) {
        debug_assert!(
            self.available + quantity <= self.total_capacity,
            "restore exceeds capacity"
        );
        self.available += quantity;
    }

    /// Change total capacity
    ///
    /// Fails if `new_total` would drop below the currently allocated sum.
    pub(crate) fn set_total_capacity(&mut self, new_total: u64) -> Result<(), WardenError> {
        let allocated = self.allocated();
        if new_total < allocated {
            return Err(WardenError::ResourceCapacityExceeded {
                resource: self.id,
                requested: allocated,
                capacity: new_total,
            });
        }
        self.available = new_total - allocated;
        self.total_capacity = new_total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_restore_roundtrip() {
        let mut res = Resource::new(1, "api".to_string(), ResourceCategory::ApiRateLimit, 10);
        res.reserve(4);
        assert_eq!(res.available(), 6);
        assert_eq!(res.allocated(), 4);
        res.restore(4);
        assert_eq!(res.available(), 10);
    }

    #[test]
    fn test_capacity_update_respects_allocation() {
        let mut res = Resource::new(1, "api".to_string(), ResourceCategory::ApiRateLimit, 10);
        res.reserve(6);

        // Shrinking below the allocated sum is rejected
        assert!(res.set_total_capacity(5).is_err());

        // Shrinking to exactly the allocated sum leaves nothing available
        res.set_total_capacity(6).unwrap();
        assert_eq!(res.available(), 0);

        // Growing adds availability
        res.set_total_capacity(12).unwrap();
        assert_eq!(res.available(), 6);
        assert_eq!(res.allocated(), 6);
    }

    #[test]
    fn test_utilization() {
        let mut res = Resource::new(1, "api".to_string(), ResourceCategory::ApiRateLimit, 10);
        assert_eq!(res.utilization(), 0.0);
        res.reserve(5);
        assert!((res.utilization() - 0.5).abs() < 1e-9);

        let empty = Resource::new(2, "void".to_string(), ResourceCategory::Custom, 0);
        assert_eq!(empty.utilization(), 0.0);
    }
}
