//! Domain model for enriched person records.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep create/update/list payload shapes next to the stored record.
//!
//! # Invariants
//! - Every stored person is identified by a storage-assigned `PersonId`.
//! - Validation lives on the payload types, not in transport code.

pub mod filter;
pub mod person;
