//! gridlet-scheduler: Allocation scheduler for gridlet
//!
//! This crate provides the arbitration core of the resource manager:
//! - Reservation admission against availability and time-window conflicts
//! - Atomic inventory + ledger transitions behind per-GPU locks
//! - Tick-driven activation and completion
//! - The `Manager` facade the host wires at startup

pub mod manager;
pub mod scheduler;

pub use manager::{Manager, StatusSummary};
pub use scheduler::{AllocationScheduler, TickSummary};
