//! Person domain model.
//!
//! # Responsibility
//! - Define the canonical stored person record and its create payload.
//! - Own field-level validation shared by service and repository layers.
//!
//! # Invariants
//! - `PersonId` is assigned by storage and never reused.
//! - `name` and `surname` are always present and within length bounds.
//! - Enrichment fields are either all set by create or edited one by one by
//!   update; the model itself does not force them together.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned identity of a person row.
pub type PersonId = i64;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const AGE_MAX: u32 = 120;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{L}[\p{L}' \-]*$").expect("valid name regex"));

/// Predicted gender label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// Parses a label case-insensitively; surrounding whitespace is ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-letter lowercase country code (`ru`, `ua`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Normalizes to lowercase and accepts exactly two ASCII letters.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized.len() == 2 && normalized.bytes().all(|b| b.is_ascii_lowercase()) {
            Some(Self(normalized))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CountryCode {
    type Error = PersonValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(PersonValidationError::InvalidNationality(value))
    }
}

impl From<CountryCode> for String {
    fn from(value: CountryCode) -> Self {
        value.0
    }
}

impl Display for CountryCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field-level validation failure for person payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonValidationError {
    /// A required name field is empty after trimming.
    EmptyField(&'static str),
    /// A name field is shorter or longer than allowed.
    FieldLength {
        field: &'static str,
        chars: usize,
    },
    /// A name field contains characters other than letters, space, `-`, `'`.
    FieldCharacters(&'static str),
    AgeOutOfRange(u32),
    InvalidNationality(String),
    /// Filter bounds where `age_min > age_max`.
    AgeRangeInverted { min: u32, max: u32 },
    InvalidGender(String),
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::FieldLength { field, chars } => write!(
                f,
                "{field} must be {NAME_MIN_CHARS}..={NAME_MAX_CHARS} characters, got {chars}"
            ),
            Self::FieldCharacters(field) => write!(
                f,
                "{field} may contain only letters, spaces, hyphens and apostrophes"
            ),
            Self::AgeOutOfRange(age) => write!(f, "age {age} is outside 0..={AGE_MAX}"),
            Self::InvalidNationality(value) => {
                write!(f, "nationality `{value}` is not a two-letter country code")
            }
            Self::AgeRangeInverted { min, max } => {
                write!(f, "age_min {min} is greater than age_max {max}")
            }
            Self::InvalidGender(value) => {
                write!(f, "gender `{value}` is not one of male|female")
            }
        }
    }
}

impl Error for PersonValidationError {}

/// Create-request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonInput {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub patronymic: Option<String>,
}

impl PersonInput {
    pub fn new(name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            patronymic: None,
        }
    }

    pub fn with_patronymic(mut self, patronymic: impl Into<String>) -> Self {
        self.patronymic = Some(patronymic.into());
        self
    }

    /// Trims name fields; a blank patronymic becomes absent.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            surname: self.surname.trim().to_string(),
            patronymic: trim_optional(self.patronymic),
        }
    }

    /// Checks name fields without touching any external service.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        validate_name_field("name", &self.name)?;
        validate_name_field("surname", &self.surname)?;
        if let Some(patronymic) = self.patronymic.as_deref() {
            validate_name_field("patronymic", patronymic)?;
        }
        Ok(())
    }
}

/// Complete predictions produced by one successful enrichment pass.
///
/// Only constructed when every lookup succeeded, so a `Person` created from
/// it never carries a partial set of predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub age: u32,
    pub gender: Gender,
    pub nationality: CountryCode,
}

/// Mutable field set of a person, used for create and full-replace update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonData {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub patronymic: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub nationality: Option<CountryCode>,
}

impl PersonData {
    /// Assembles a fully enriched field set from create input.
    pub fn enriched(input: PersonInput, enrichment: Enrichment) -> Self {
        Self {
            name: input.name,
            surname: input.surname,
            patronymic: input.patronymic,
            age: Some(enrichment.age),
            gender: Some(enrichment.gender),
            nationality: Some(enrichment.nationality),
        }
    }

    /// Trims name fields; a blank patronymic becomes absent.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            surname: self.surname.trim().to_string(),
            patronymic: trim_optional(self.patronymic),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), PersonValidationError> {
        validate_name_field("name", &self.name)?;
        validate_name_field("surname", &self.surname)?;
        if let Some(patronymic) = self.patronymic.as_deref() {
            validate_name_field("patronymic", patronymic)?;
        }
        if let Some(age) = self.age {
            if age > AGE_MAX {
                return Err(PersonValidationError::AgeOutOfRange(age));
            }
        }
        Ok(())
    }

    /// Attaches a storage identity.
    pub fn into_person(self, id: PersonId) -> Person {
        Person {
            id,
            name: self.name,
            surname: self.surname,
            patronymic: self.patronymic,
            age: self.age,
            gender: self.gender,
            nationality: self.nationality,
        }
    }
}

/// Canonical stored person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub nationality: Option<CountryCode>,
}

impl Person {
    /// Returns the id-less field set, e.g. as a base for partial edits.
    pub fn data(&self) -> PersonData {
        PersonData {
            name: self.name.clone(),
            surname: self.surname.clone(),
            patronymic: self.patronymic.clone(),
            age: self.age,
            gender: self.gender,
            nationality: self.nationality.clone(),
        }
    }

    /// Whether all three predictions are present.
    pub fn is_enriched(&self) -> bool {
        self.age.is_some() && self.gender.is_some() && self.nationality.is_some()
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn validate_name_field(field: &'static str, value: &str) -> Result<(), PersonValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PersonValidationError::EmptyField(field));
    }
    let chars = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(PersonValidationError::FieldLength { field, chars });
    }
    if !NAME_RE.is_match(trimmed) {
        return Err(PersonValidationError::FieldCharacters(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CountryCode, Gender, PersonData, PersonInput, PersonValidationError};

    #[test]
    fn input_accepts_cyrillic_and_hyphenated_names() {
        let input = PersonInput::new("Анна-Мария", "Иванова").with_patronymic("Петровна");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn input_rejects_short_and_symbolic_names() {
        let short = PersonInput::new("A", "Smith");
        assert_eq!(
            short.validate().unwrap_err(),
            PersonValidationError::FieldLength {
                field: "name",
                chars: 1
            }
        );

        let symbols = PersonInput::new("Ivan", "Drop;Table");
        assert_eq!(
            symbols.validate().unwrap_err(),
            PersonValidationError::FieldCharacters("surname")
        );

        let blank = PersonInput::new("   ", "Smith");
        assert_eq!(
            blank.validate().unwrap_err(),
            PersonValidationError::EmptyField("name")
        );
    }

    #[test]
    fn normalized_input_trims_and_drops_blank_patronymic() {
        let input = PersonInput::new("  Ivan ", "Ivanov\t").with_patronymic("   ").normalized();
        assert_eq!(input.name, "Ivan");
        assert_eq!(input.surname, "Ivanov");
        assert!(input.patronymic.is_none());
    }

    #[test]
    fn country_code_normalizes_and_rejects_bad_values() {
        assert_eq!(CountryCode::parse("RU").unwrap().as_str(), "ru");
        assert!(CountryCode::parse("rus").is_none());
        assert!(CountryCode::parse("r1").is_none());
    }

    #[test]
    fn gender_parse_is_case_insensitive() {
        assert_eq!(Gender::parse("Male"), Some(Gender::Male));
        assert_eq!(Gender::parse(" FEMALE "), Some(Gender::Female));
        assert_eq!(Gender::parse("unknown"), None);
    }

    #[test]
    fn data_rejects_age_above_limit() {
        let data = PersonData {
            name: "Ivan".to_string(),
            surname: "Ivanov".to_string(),
            patronymic: None,
            age: Some(121),
            gender: None,
            nationality: None,
        };
        assert_eq!(
            data.validate().unwrap_err(),
            PersonValidationError::AgeOutOfRange(121)
        );
    }

    #[test]
    fn data_deserializes_with_lowercase_labels() {
        let data: PersonData = serde_json::from_str(
            r#"{"name":"Ivan","surname":"Ivanov","age":30,"gender":"male","nationality":"ru"}"#,
        )
        .unwrap();
        assert_eq!(data.gender, Some(Gender::Male));
        assert_eq!(data.nationality.unwrap().as_str(), "ru");
        assert!(data.patronymic.is_none());
    }
}
