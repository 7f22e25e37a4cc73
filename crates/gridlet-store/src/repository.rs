//! Repository trait definitions
//!
//! The manager treats storage as a narrow transactional boundary: single
//! reads and writes per entity table, plus an atomic multi-entity commit
//! used by the reserve/activate/release operations.

use async_trait::async_trait;
use gridlet_core::{EnvironmentalRecord, Gpu, GridletResult, Reservation};
use uuid::Uuid;

/// A batch of entity writes applied all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    /// GPU rows to upsert
    pub gpus: Vec<Gpu>,
    /// Reservation rows to upsert
    pub reservations: Vec<Reservation>,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a GPU write
    pub fn with_gpu(mut self, gpu: Gpu) -> Self {
        self.gpus.push(gpu);
        self
    }

    /// Add a reservation write
    pub fn with_reservation(mut self, reservation: Reservation) -> Self {
        self.reservations.push(reservation);
        self
    }

    /// Whether the transaction carries no writes
    pub fn is_empty(&self) -> bool {
        self.gpus.is_empty() && self.reservations.is_empty()
    }
}

/// Transactional persistence boundary for the resource manager
#[async_trait]
pub trait Repository: Send + Sync {
    /// Read a GPU row by id
    async fn read_gpu(&self, id: &str) -> GridletResult<Option<Gpu>>;

    /// Read all GPU rows
    async fn read_gpus(&self) -> GridletResult<Vec<Gpu>>;

    /// Upsert a GPU row
    async fn write_gpu(&self, gpu: Gpu) -> GridletResult<()>;

    /// Read a reservation row by id
    async fn read_reservation(&self, id: Uuid) -> GridletResult<Option<Reservation>>;

    /// Read all reservation rows for a GPU, ordered by window start then
    /// creation time for deterministic iteration
    async fn read_reservations(&self, gpu_id: &str) -> GridletResult<Vec<Reservation>>;

    /// Upsert a reservation row
    async fn write_reservation(&self, reservation: Reservation) -> GridletResult<()>;

    /// Upsert an environmental record
    async fn write_record(&self, record: EnvironmentalRecord) -> GridletResult<()>;

    /// Read all persisted environmental records
    async fn read_records(&self) -> GridletResult<Vec<EnvironmentalRecord>>;

    /// Apply every write in the transaction atomically; on failure no
    /// write is visible.
    async fn commit(&self, txn: Transaction) -> GridletResult<()>;
}
