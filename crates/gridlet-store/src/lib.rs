//! gridlet-store: Storage boundary for gridlet
//!
//! This crate provides the narrow persistence interface the manager is
//! built against:
//! - `Repository` trait with an atomic multi-entity transaction primitive
//! - In-memory reference backend
//! - Retrying adapter (bounded timeouts, single commit retry)

pub mod memory;
pub mod repository;
pub mod retry;

pub use memory::MemoryRepository;
pub use repository::{Repository, Transaction};
pub use retry::RetryingRepository;
