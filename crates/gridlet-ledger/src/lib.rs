//! gridlet-ledger: Reservation ledger
//!
//! Pure bookkeeping for reservation records and their lifecycle,
//! independent of allocation mechanics.

pub mod ledger;

pub use ledger::ReservationLedger;
