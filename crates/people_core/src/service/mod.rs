//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, enrichment and repository calls into use-case
//!   level APIs.
//! - Keep CLI/transport layers decoupled from storage and HTTP details.

pub mod person_service;
