//! Partner hierarchy services.
//!
//! # Responsibility
//! - Cycle-safe parent maintenance and commercial-entity resolution.
//! - Field synchronization between relatives on every create/write.
//! - Typed address lookup and address formatting.
//! - Category tree use-cases.
//!
//! # Invariants
//! - Services never touch SQL; they go through repository traits.

pub mod address;
pub mod address_format;
pub mod category_service;
pub mod commercial;
pub mod error;
pub mod hierarchy;
pub mod naming;
pub mod partner_service;
pub mod sync;
