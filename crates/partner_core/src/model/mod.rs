//! Partner domain model.
//!
//! # Responsibility
//! - Define partner, country and category records used by the core.
//! - Keep records storage-agnostic; repositories own SQL mapping.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Parent links are stored as ids, never as owned pointers.

pub mod category;
pub mod country;
pub mod partner;
