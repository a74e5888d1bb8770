//! Core domain logic for the people directory.
//! Stores person records enriched with predicted age, gender and nationality.

pub mod config;
pub mod db;
pub mod deadline;
pub mod enrich;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod translit;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use deadline::{Deadline, Interrupted};
pub use enrich::{
    EnrichError, EnrichmentClient, EnrichmentEndpoints, HttpEnrichmentClient, Lookup,
    UpstreamFailure,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::filter::FilterCriteria;
pub use model::person::{
    CountryCode, Enrichment, Gender, Person, PersonData, PersonId, PersonInput,
    PersonValidationError,
};
pub use repo::person_repo::{PersonRepository, RepoError, RepoResult, SqlitePersonRepository};
pub use service::person_service::{
    EnrichFailure, ErrorKind, PersonService, ServiceError, ServiceResult, Stage,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
