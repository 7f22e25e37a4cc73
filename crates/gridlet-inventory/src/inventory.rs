//! Authoritative GPU inventory

use gridlet_core::{CapabilityFilter, Gpu, GpuStatus, GridletError, GridletResult};
use gridlet_store::Repository;
use std::sync::Arc;
use tracing::{debug, info};

/// Inventory store tracking GPUs, their static attributes, and current status
pub struct InventoryStore {
    repo: Arc<dyn Repository>,
}

impl InventoryStore {
    /// Create an inventory store over a repository
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Register a new GPU; rejects duplicate ids
    pub async fn register(&self, gpu: Gpu) -> GridletResult<()> {
        if self.repo.read_gpu(&gpu.id).await?.is_some() {
            return Err(GridletError::Conflict(format!(
                "GPU already registered: {}",
                gpu.id
            )));
        }

        info!(
            gpu_id = %gpu.id,
            memory_total = gpu.capability.memory_total,
            compute_class = %gpu.capability.compute_class,
            "Registered GPU"
        );
        self.repo.write_gpu(gpu).await
    }

    /// Look up a GPU by id
    pub async fn get(&self, id: &str) -> GridletResult<Gpu> {
        self.repo
            .read_gpu(id)
            .await?
            .ok_or_else(|| GridletError::GpuNotFound(id.to_string()))
    }

    /// Current status of a GPU
    pub async fn get_status(&self, id: &str) -> GridletResult<GpuStatus> {
        Ok(self.get(id).await?.status)
    }

    /// Set a GPU's status.
    ///
    /// Moving to maintenance is refused while an active reservation holds
    /// the GPU. Moving to available clears the reservation back-reference.
    pub async fn set_status(&self, id: &str, status: GpuStatus) -> GridletResult<()> {
        let mut gpu = self.get(id).await?;

        if status == GpuStatus::Maintenance && gpu.active_reservation.is_some() {
            return Err(GridletError::ResourceBusy(format!(
                "GPU {} is held by an active reservation",
                id
            )));
        }

        debug!(gpu_id = %id, from = %gpu.status, to = %status, "GPU status change");
        gpu.status = status;
        if status != GpuStatus::Reserved {
            gpu.active_reservation = None;
        }
        self.repo.write_gpu(gpu).await
    }

    /// Snapshot of all registered GPUs, sorted by id
    pub async fn list(&self) -> GridletResult<Vec<Gpu>> {
        self.repo.read_gpus().await
    }

    /// Snapshot of available GPUs matching the filter, sorted by id
    pub async fn list_available(&self, filter: &CapabilityFilter) -> GridletResult<Vec<Gpu>> {
        let gpus = self.repo.read_gpus().await?;
        Ok(gpus
            .into_iter()
            .filter(|g| g.status == GpuStatus::Available && g.capability.matches(filter))
            .collect())
    }
}
