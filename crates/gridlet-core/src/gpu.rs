//! GPU inventory types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Compute class tiers for rentable GPUs, ordered weakest to strongest
/// so capability filters can express "at least".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeClass {
    /// General-purpose inference cards
    Standard,
    /// Training-grade cards
    Performance,
    /// Top-end datacenter cards
    Flagship,
}

impl std::fmt::Display for ComputeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeClass::Standard => write!(f, "standard"),
            ComputeClass::Performance => write!(f, "performance"),
            ComputeClass::Flagship => write!(f, "flagship"),
        }
    }
}

/// Static capability descriptor for a GPU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuCapability {
    /// Total memory in bytes
    pub memory_total: u64,
    /// Compute class tier
    pub compute_class: ComputeClass,
}

impl GpuCapability {
    /// Check whether this capability satisfies a filter
    pub fn matches(&self, filter: &CapabilityFilter) -> bool {
        if let Some(min_memory) = filter.min_memory {
            if self.memory_total < min_memory {
                return false;
            }
        }
        if let Some(min_class) = filter.min_compute_class {
            if self.compute_class < min_class {
                return false;
            }
        }
        true
    }
}

/// Filter for capability-based GPU queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityFilter {
    /// Minimum total memory in bytes
    pub min_memory: Option<u64>,
    /// Minimum compute class tier
    pub min_compute_class: Option<ComputeClass>,
}

/// GPU allocation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuStatus {
    /// Free for allocation
    Available,
    /// Held by a reservation
    Reserved,
    /// Withdrawn from allocation by the operator
    Maintenance,
}

impl std::fmt::Display for GpuStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuStatus::Available => write!(f, "available"),
            GpuStatus::Reserved => write!(f, "reserved"),
            GpuStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// A rentable GPU tracked by the inventory store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gpu {
    /// Operator-assigned identifier (e.g. "gpu-1")
    pub id: String,
    /// Static capability descriptor
    pub capability: GpuCapability,
    /// Current allocation status
    pub status: GpuStatus,
    /// Reservation currently holding this GPU, if any (lookup only)
    pub active_reservation: Option<Uuid>,
}

impl Gpu {
    /// Create a new GPU in the available state
    pub fn new(id: impl Into<String>, capability: GpuCapability) -> Self {
        Self {
            id: id.into(),
            capability,
            status: GpuStatus::Available,
            active_reservation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(memory_gb: u64, class: ComputeClass) -> GpuCapability {
        GpuCapability {
            memory_total: memory_gb * 1024 * 1024 * 1024,
            compute_class: class,
        }
    }

    #[test]
    fn test_gpu_new_is_available() {
        let gpu = Gpu::new("gpu-1", capability(24, ComputeClass::Standard));
        assert_eq!(gpu.status, GpuStatus::Available);
        assert!(gpu.active_reservation.is_none());
    }

    #[test]
    fn test_capability_filter_memory() {
        let cap = capability(24, ComputeClass::Standard);
        let filter = CapabilityFilter {
            min_memory: Some(16 * 1024 * 1024 * 1024),
            min_compute_class: None,
        };
        assert!(cap.matches(&filter));

        let filter = CapabilityFilter {
            min_memory: Some(48 * 1024 * 1024 * 1024),
            min_compute_class: None,
        };
        assert!(!cap.matches(&filter));
    }

    #[test]
    fn test_capability_filter_compute_class() {
        let cap = capability(80, ComputeClass::Performance);
        let filter = CapabilityFilter {
            min_memory: None,
            min_compute_class: Some(ComputeClass::Standard),
        };
        assert!(cap.matches(&filter));

        let filter = CapabilityFilter {
            min_memory: None,
            min_compute_class: Some(ComputeClass::Flagship),
        };
        assert!(!cap.matches(&filter));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let cap = capability(8, ComputeClass::Standard);
        assert!(cap.matches(&CapabilityFilter::default()));
    }

    #[test]
    fn test_gpu_status_display() {
        assert_eq!(GpuStatus::Available.to_string(), "available");
        assert_eq!(GpuStatus::Maintenance.to_string(), "maintenance");
    }
}
