//! Filtered, paginated listing query construction.
//!
//! # Responsibility
//! - Translate normalized filter criteria into one parameterized SELECT.
//!
//! # Invariants
//! - Values are only ever bound, never written into SQL text.
//! - Placeholders are numbered when their value is pushed, so placeholder
//!   `?N` always refers to `params[N - 1]`.
//! - Filters are conjunctive and applied in a fixed order: name, surname,
//!   age_min, age_max, gender, nationality. `LIMIT`/`OFFSET` always come last.

use crate::model::filter::NormalizedCriteria;
use rusqlite::types::Value;

pub(crate) const PERSON_SELECT_SQL: &str = "SELECT
    person_id,
    name,
    surname,
    patronymic,
    age,
    gender,
    nationality
FROM people";

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Accumulates `(condition, value)` pairs for the people listing query.
#[derive(Debug, Default)]
pub struct PersonQueryBuilder {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl PersonQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the listing query for already-normalized criteria.
    pub fn for_criteria(criteria: &NormalizedCriteria) -> BuiltQuery {
        let mut builder = Self::new();
        if let Some(name) = criteria.name.as_deref() {
            builder.contains("name", name);
        }
        if let Some(surname) = criteria.surname.as_deref() {
            builder.contains("surname", surname);
        }
        if let Some(age_min) = criteria.age_min {
            builder.compare("age", ">=", Value::Integer(i64::from(age_min)));
        }
        if let Some(age_max) = criteria.age_max {
            builder.compare("age", "<=", Value::Integer(i64::from(age_max)));
        }
        if let Some(gender) = criteria.gender {
            builder.compare("gender", "=", Value::Text(gender.as_str().to_string()));
        }
        if let Some(nationality) = criteria.nationality.as_ref() {
            builder.compare("nationality", "=", Value::Text(nationality.to_string()));
        }
        builder.paginate(criteria.page_size, criteria.offset())
    }

    /// Case-insensitive substring match on `column`.
    pub fn contains(&mut self, column: &'static str, needle: &str) -> &mut Self {
        let placeholder = self.bind(Value::Text(format!("%{}%", escape_like(needle))));
        self.conditions.push(format!(
            "casefold({column}) LIKE casefold({placeholder}) ESCAPE '\\'"
        ));
        self
    }

    /// `column <op> value` with a static operator.
    pub fn compare(&mut self, column: &'static str, op: &'static str, value: Value) -> &mut Self {
        let placeholder = self.bind(value);
        self.conditions.push(format!("{column} {op} {placeholder}"));
        self
    }

    /// Appends ordering and pagination and returns the finished query.
    pub fn paginate(mut self, limit: u32, offset: u64) -> BuiltQuery {
        let mut sql = String::from(PERSON_SELECT_SQL);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY person_id ASC");

        let limit_placeholder = self.bind(Value::Integer(i64::from(limit)));
        let offset_placeholder =
            self.bind(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT {limit_placeholder} OFFSET {offset_placeholder}"));

        BuiltQuery {
            sql,
            params: self.params,
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }
}

/// Escapes LIKE wildcards so user text only matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
