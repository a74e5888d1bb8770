//! Person repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and filtered listing over the `people` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths validate `PersonData` before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Every statement runs under the caller's `Deadline`; an interrupted
//!   statement is reported as `Db(Interrupted)`, never as `NotFound`.

use crate::db::{with_deadline, DbError};
use crate::deadline::{Deadline, Interrupted};
use crate::model::filter::FilterCriteria;
use crate::model::person::{CountryCode, Gender, Person, PersonData, PersonId, PersonValidationError};
use crate::repo::person_query::{PersonQueryBuilder, PERSON_SELECT_SQL};
use log::debug;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for person persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PersonValidationError),
    Db(DbError),
    NotFound(PersonId),
    InvalidData(String),
}

impl RepoError {
    /// Returns the interruption reason when a deadline stopped the operation.
    pub fn interrupted(&self) -> Option<Interrupted> {
        match self {
            Self::Db(err) => err.interrupted(),
            _ => None,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "person not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted person data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<PersonValidationError> for RepoError {
    fn from(value: PersonValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for person CRUD and listing.
pub trait PersonRepository {
    /// Inserts a row and returns its generated id.
    fn create(&self, data: &PersonData, deadline: &Deadline) -> RepoResult<PersonId>;
    fn get_by_id(&self, id: PersonId, deadline: &Deadline) -> RepoResult<Person>;
    /// Lists rows matching all supplied filters; empty when nothing matches.
    fn get_all(&self, criteria: &FilterCriteria, deadline: &Deadline) -> RepoResult<Vec<Person>>;
    /// Replaces every mutable field of an existing row.
    fn update(&self, id: PersonId, data: &PersonData, deadline: &Deadline) -> RepoResult<()>;
    fn delete(&self, id: PersonId, deadline: &Deadline) -> RepoResult<()>;
}

impl<R: PersonRepository + ?Sized> PersonRepository for &R {
    fn create(&self, data: &PersonData, deadline: &Deadline) -> RepoResult<PersonId> {
        (**self).create(data, deadline)
    }

    fn get_by_id(&self, id: PersonId, deadline: &Deadline) -> RepoResult<Person> {
        (**self).get_by_id(id, deadline)
    }

    fn get_all(&self, criteria: &FilterCriteria, deadline: &Deadline) -> RepoResult<Vec<Person>> {
        (**self).get_all(criteria, deadline)
    }

    fn update(&self, id: PersonId, data: &PersonData, deadline: &Deadline) -> RepoResult<()> {
        (**self).update(id, data, deadline)
    }

    fn delete(&self, id: PersonId, deadline: &Deadline) -> RepoResult<()> {
        (**self).delete(id, deadline)
    }
}

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Wraps a migrated connection from `db::open_db*`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn create(&self, data: &PersonData, deadline: &Deadline) -> RepoResult<PersonId> {
        data.validate()?;

        let id = with_deadline(self.conn, deadline, |conn| {
            conn.execute(
                "INSERT INTO people (
                    name,
                    surname,
                    patronymic,
                    age,
                    gender,
                    nationality
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    data.name.as_str(),
                    data.surname.as_str(),
                    data.patronymic.as_deref(),
                    data.age,
                    data.gender.map(Gender::as_str),
                    data.nationality.as_ref().map(CountryCode::as_str),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!("event=person_insert module=repo status=ok person_id={id}");
        Ok(id)
    }

    fn get_by_id(&self, id: PersonId, deadline: &Deadline) -> RepoResult<Person> {
        let row = with_deadline(self.conn, deadline, |conn| {
            conn.query_row(
                &format!("{PERSON_SELECT_SQL} WHERE person_id = ?1;"),
                [id],
                read_person_row,
            )
            .optional()
        })?;

        row.ok_or(RepoError::NotFound(id))?.into_person()
    }

    fn get_all(&self, criteria: &FilterCriteria, deadline: &Deadline) -> RepoResult<Vec<Person>> {
        let normalized = criteria.normalized()?;
        let query = PersonQueryBuilder::for_criteria(&normalized);

        let rows = with_deadline(self.conn, deadline, |conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let rows = stmt.query_map(params_from_iter(query.params.iter()), read_person_row)?;
            let raw = rows.collect::<rusqlite::Result<Vec<_>>>();
            raw
        })?;

        debug!(
            "event=person_list module=repo status=ok page={} page_size={} filters={} rows={}",
            normalized.page,
            normalized.page_size,
            query.params.len() - 2,
            rows.len()
        );
        rows.into_iter().map(RawPerson::into_person).collect()
    }

    fn update(&self, id: PersonId, data: &PersonData, deadline: &Deadline) -> RepoResult<()> {
        data.validate()?;

        let changed = with_deadline(self.conn, deadline, |conn| {
            conn.execute(
                "UPDATE people
                 SET
                    name = ?1,
                    surname = ?2,
                    patronymic = ?3,
                    age = ?4,
                    gender = ?5,
                    nationality = ?6
                 WHERE person_id = ?7;",
                params![
                    data.name.as_str(),
                    data.surname.as_str(),
                    data.patronymic.as_deref(),
                    data.age,
                    data.gender.map(Gender::as_str),
                    data.nationality.as_ref().map(CountryCode::as_str),
                    id,
                ],
            )
        })?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete(&self, id: PersonId, deadline: &Deadline) -> RepoResult<()> {
        let changed = with_deadline(self.conn, deadline, |conn| {
            conn.execute("DELETE FROM people WHERE person_id = ?1;", [id])
        })?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

/// Column values as stored, before domain parsing.
struct RawPerson {
    id: PersonId,
    name: String,
    surname: String,
    patronymic: Option<String>,
    age: Option<i64>,
    gender: Option<String>,
    nationality: Option<String>,
}

fn read_person_row(row: &Row<'_>) -> rusqlite::Result<RawPerson> {
    Ok(RawPerson {
        id: row.get("person_id")?,
        name: row.get("name")?,
        surname: row.get("surname")?,
        patronymic: row.get("patronymic")?,
        age: row.get("age")?,
        gender: row.get("gender")?,
        nationality: row.get("nationality")?,
    })
}

impl RawPerson {
    fn into_person(self) -> RepoResult<Person> {
        let age = match self.age {
            Some(value) => Some(u32::try_from(value).map_err(|_| {
                RepoError::InvalidData(format!("invalid age `{value}` in people.age"))
            })?),
            None => None,
        };

        let gender = match self.gender {
            Some(value) => Some(Gender::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid gender `{value}` in people.gender"))
            })?),
            None => None,
        };

        let nationality = match self.nationality {
            Some(value) => Some(CountryCode::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid nationality `{value}` in people.nationality"
                ))
            })?),
            None => None,
        };

        let data = PersonData {
            name: self.name,
            surname: self.surname,
            patronymic: self.patronymic,
            age,
            gender,
            nationality,
        };
        data.validate()
            .map_err(|err| RepoError::InvalidData(format!("person {}: {err}", self.id)))?;
        Ok(data.into_person(self.id))
    }
}
