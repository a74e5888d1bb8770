//! Person use-case service.
//!
//! # Responsibility
//! - Orchestrate validation, enrichment lookups and persistence for create.
//! - Provide pass-through read/update/delete/list entry points.
//!
//! # Invariants
//! - Input is validated before any upstream call.
//! - Enrichment is all-or-nothing: one failed lookup aborts create and nothing
//!   is persisted.
//! - Only the age lookup receives the transliterated name.
//! - Errors name the operation and, for create, the failing stage.

use crate::deadline::Deadline;
use crate::enrich::{EnrichError, EnrichResult, EnrichmentClient};
use crate::model::filter::FilterCriteria;
use crate::model::person::{Enrichment, Person, PersonData, PersonId, PersonInput, PersonValidationError};
use crate::repo::person_repo::{PersonRepository, RepoError};
use crate::translit::transliterate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::thread;
use std::time::Instant;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Step of the create flow at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    AgeLookup,
    GenderLookup,
    NationalityLookup,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::AgeLookup => "age_lookup",
            Self::GenderLookup => "gender_lookup",
            Self::NationalityLookup => "nationality_lookup",
            Self::Persist => "persist",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-neutral classification of service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Upstream,
    NoData,
    NotFound,
    Store,
    /// The caller's deadline was cancelled or expired.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Upstream => "upstream",
            Self::NoData => "no_data",
            Self::NotFound => "not_found",
            Self::Store => "store",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A failed enrichment pass: which lookup failed and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichFailure {
    pub stage: Stage,
    pub source: EnrichError,
}

impl Display for EnrichFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {}: {}", self.stage, self.source)
    }
}

/// Service error for person use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Validation {
        operation: &'static str,
        source: PersonValidationError,
    },
    Enrichment(EnrichFailure),
    NotFound {
        operation: &'static str,
        id: PersonId,
    },
    Store {
        operation: &'static str,
        source: RepoError,
    },
}

impl ServiceError {
    fn from_repo(operation: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => Self::NotFound { operation, id },
            RepoError::Validation(source) => Self::Validation { operation, source },
            other => Self::Store {
                operation,
                source: other,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Enrichment(failure) => match failure.source {
                EnrichError::Upstream { .. } => ErrorKind::Upstream,
                EnrichError::NoData(_) => ErrorKind::NoData,
                EnrichError::Interrupted { .. } => ErrorKind::Cancelled,
            },
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Store { source, .. } => {
                if source.interrupted().is_some() {
                    ErrorKind::Cancelled
                } else {
                    ErrorKind::Store
                }
            }
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Enrichment(_) => "create",
            Self::Validation { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Store { operation, .. } => operation,
        }
    }

    /// Failing create stage; `None` for the pass-through operations.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Enrichment(failure) => Some(failure.stage),
            Self::Validation {
                operation: "create",
                ..
            } => Some(Stage::Validate),
            Self::Store {
                operation: "create",
                ..
            }
            | Self::NotFound {
                operation: "create",
                ..
            } => Some(Stage::Persist),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { operation, source } => {
                write!(f, "{operation}: invalid input: {source}")
            }
            Self::Enrichment(failure) => write!(f, "create: enrichment failed at {failure}"),
            Self::NotFound { operation, id } => write!(f, "{operation}: person not found: {id}"),
            Self::Store { operation, source } => write!(f, "{operation}: store failure: {source}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation { source, .. } => Some(source),
            Self::Enrichment(failure) => Some(&failure.source),
            Self::NotFound { .. } => None,
            Self::Store { source, .. } => Some(source),
        }
    }
}

/// Person service facade over a repository and an enrichment client.
pub struct PersonService<R: PersonRepository, C: EnrichmentClient> {
    repo: R,
    client: C,
}

impl<R: PersonRepository, C: EnrichmentClient> PersonService<R, C> {
    /// Creates a service using the provided repository and client.
    pub fn new(repo: R, client: C) -> Self {
        Self { repo, client }
    }

    /// Validates, enriches and persists a new person.
    ///
    /// # Contract
    /// - Returns the stored record with all three predictions and its new id.
    /// - On any failure nothing has been written.
    pub fn create(&self, input: PersonInput, deadline: &Deadline) -> ServiceResult<Person> {
        let started_at = Instant::now();
        let input = input.normalized();
        input.validate().map_err(|source| ServiceError::Validation {
            operation: "create",
            source,
        })?;

        let enrichment = self.enrich(&input.name, deadline).map_err(|failure| {
            warn!(
                "event=person_create module=service status=error stage={} error_code={} duration_ms={}",
                failure.stage,
                failure.source.code(),
                started_at.elapsed().as_millis()
            );
            ServiceError::Enrichment(failure)
        })?;

        let data = PersonData::enriched(input, enrichment);
        let id = self.repo.create(&data, deadline).map_err(|err| {
            warn!(
                "event=person_create module=service status=error stage={} duration_ms={} error={}",
                Stage::Persist,
                started_at.elapsed().as_millis(),
                err
            );
            ServiceError::from_repo("create", err)
        })?;

        info!(
            "event=person_create module=service status=ok person_id={} duration_ms={}",
            id,
            started_at.elapsed().as_millis()
        );
        Ok(data.into_person(id))
    }

    /// Runs the three lookups in parallel and combines them.
    ///
    /// The first failing lookup cancels its siblings. When several fail, the
    /// earliest stage (age, gender, nationality) that did not fail merely
    /// because a sibling cancelled it is reported.
    pub fn enrich(&self, name: &str, deadline: &Deadline) -> Result<Enrichment, EnrichFailure> {
        let client = &self.client;
        let latin_name = transliterate(name);
        let siblings = deadline.scope();

        let (age, gender, nationality) = thread::scope(|scope| {
            let age = scope.spawn(|| cancel_on_error(&siblings, client.age(&latin_name, &siblings)));
            let gender = scope.spawn(|| cancel_on_error(&siblings, client.gender(name, &siblings)));
            let nationality =
                scope.spawn(|| cancel_on_error(&siblings, client.nationality(name, &siblings)));
            (join_lookup(age), join_lookup(gender), join_lookup(nationality))
        });

        match (age, gender, nationality) {
            (Ok(age), Ok(gender), Ok(nationality)) => Ok(Enrichment {
                age,
                gender,
                nationality,
            }),
            (age, gender, nationality) => {
                let failures = [
                    (Stage::AgeLookup, age.err()),
                    (Stage::GenderLookup, gender.err()),
                    (Stage::NationalityLookup, nationality.err()),
                ];
                Err(first_failure(failures, deadline))
            }
        }
    }

    /// Gets one person by id.
    pub fn get_by_id(&self, id: PersonId, deadline: &Deadline) -> ServiceResult<Person> {
        self.repo
            .get_by_id(id, deadline)
            .map_err(|err| ServiceError::from_repo("get_by_id", err))
    }

    /// Lists persons matching all supplied filters, one page at a time.
    pub fn get_all(&self, criteria: &FilterCriteria, deadline: &Deadline) -> ServiceResult<Vec<Person>> {
        self.repo
            .get_all(criteria, deadline)
            .map_err(|err| ServiceError::from_repo("get_all", err))
    }

    /// Replaces all mutable fields of an existing person.
    ///
    /// Name fields are trimmed the same way `create` trims its input.
    pub fn update(&self, id: PersonId, data: &PersonData, deadline: &Deadline) -> ServiceResult<()> {
        let data = data.clone().normalized();
        self.repo
            .update(id, &data, deadline)
            .map_err(|err| ServiceError::from_repo("update", err))
    }

    /// Deletes a person by id.
    pub fn delete(&self, id: PersonId, deadline: &Deadline) -> ServiceResult<()> {
        self.repo
            .delete(id, deadline)
            .map_err(|err| ServiceError::from_repo("delete", err))
    }
}

fn cancel_on_error<T>(siblings: &Deadline, result: EnrichResult<T>) -> EnrichResult<T> {
    if result.is_err() {
        siblings.cancel();
    }
    result
}

fn join_lookup<T>(handle: thread::ScopedJoinHandle<'_, EnrichResult<T>>) -> EnrichResult<T> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn first_failure(failures: [(Stage, Option<EnrichError>); 3], deadline: &Deadline) -> EnrichFailure {
    // Interruptions are only the real cause when the caller's own deadline
    // stopped; otherwise they were triggered by a failing sibling.
    let caller_interrupted = deadline.check().is_err();
    let mut fallback = None;
    for (stage, error) in failures {
        let Some(source) = error else {
            continue;
        };
        let sibling_cancelled = matches!(source, EnrichError::Interrupted { .. }) && !caller_interrupted;
        if !sibling_cancelled {
            return EnrichFailure { stage, source };
        }
        fallback.get_or_insert(EnrichFailure { stage, source });
    }
    fallback.unwrap_or_else(|| EnrichFailure {
        stage: Stage::AgeLookup,
        source: EnrichError::Interrupted {
            lookup: crate::enrich::Lookup::Age,
            reason: crate::deadline::Interrupted::Cancelled,
        },
    })
}
