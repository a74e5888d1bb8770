//! Listing filter and pagination criteria.
//!
//! # Invariants
//! - `FilterCriteria` owns no persisted state; it is built per request.
//! - After `normalized()`, `page >= 1` and `1 <= page_size <= PAGE_SIZE_MAX`.

use crate::model::person::{CountryCode, Gender, PersonValidationError};
use serde::{Deserialize, Serialize};

pub const PAGE_SIZE_DEFAULT: u32 = 10;
pub const PAGE_SIZE_MAX: u32 = 100;

/// Optional conjunctive filters plus pagination for person listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the given name.
    pub name: Option<String>,
    /// Case-insensitive substring of the family name.
    pub surname: Option<String>,
    /// Inclusive lower age bound.
    pub age_min: Option<u32>,
    /// Inclusive upper age bound.
    pub age_max: Option<u32>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    /// 1-based page number. `0` is read as `1`.
    pub page: u32,
    /// Rows per page. `0` defaults to 10, values above 100 clamp to 100.
    pub page_size: u32,
}

/// Criteria after normalization and validation, ready for query building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCriteria {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub gender: Option<Gender>,
    pub nationality: Option<CountryCode>,
    pub page: u32,
    pub page_size: u32,
}

impl NormalizedCriteria {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl FilterCriteria {
    /// First page with default page size and no filters.
    pub fn first_page() -> Self {
        Self {
            page: 1,
            page_size: PAGE_SIZE_DEFAULT,
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Trims text filters, clamps pagination and parses label filters.
    ///
    /// # Errors
    /// - `AgeRangeInverted` when both bounds are set and `age_min > age_max`.
    /// - `InvalidGender` / `InvalidNationality` for unparseable labels.
    pub fn normalized(&self) -> Result<NormalizedCriteria, PersonValidationError> {
        if let (Some(min), Some(max)) = (self.age_min, self.age_max) {
            if min > max {
                return Err(PersonValidationError::AgeRangeInverted { min, max });
            }
        }

        let gender = match non_blank(self.gender.as_deref()) {
            Some(value) => Some(
                Gender::parse(&value).ok_or(PersonValidationError::InvalidGender(value))?,
            ),
            None => None,
        };
        let nationality = match non_blank(self.nationality.as_deref()) {
            Some(value) => Some(
                CountryCode::parse(&value)
                    .ok_or(PersonValidationError::InvalidNationality(value))?,
            ),
            None => None,
        };

        Ok(NormalizedCriteria {
            name: non_blank(self.name.as_deref()),
            surname: non_blank(self.surname.as_deref()),
            age_min: self.age_min,
            age_max: self.age_max,
            gender,
            nationality,
            page: self.page.max(1),
            page_size: normalize_page_size(self.page_size),
        })
    }
}

/// Normalizes page size according to the listing contract.
pub fn normalize_page_size(page_size: u32) -> u32 {
    match page_size {
        0 => PAGE_SIZE_DEFAULT,
        value if value > PAGE_SIZE_MAX => PAGE_SIZE_MAX,
        value => value,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{normalize_page_size, FilterCriteria, PAGE_SIZE_DEFAULT, PAGE_SIZE_MAX};
    use crate::model::person::{Gender, PersonValidationError};

    #[test]
    fn pagination_is_defaulted_and_clamped() {
        assert_eq!(normalize_page_size(0), PAGE_SIZE_DEFAULT);
        assert_eq!(normalize_page_size(500), PAGE_SIZE_MAX);
        assert_eq!(normalize_page_size(25), 25);

        let normalized = FilterCriteria::default().normalized().unwrap();
        assert_eq!(normalized.page, 1);
        assert_eq!(normalized.page_size, PAGE_SIZE_DEFAULT);
        assert_eq!(normalized.offset(), 0);
    }

    #[test]
    fn blank_text_filters_are_dropped_and_labels_parsed() {
        let criteria = FilterCriteria {
            name: Some("  ".to_string()),
            surname: Some(" Ivanov ".to_string()),
            gender: Some("FEMALE".to_string()),
            nationality: Some("UA".to_string()),
            ..FilterCriteria::first_page()
        };
        let normalized = criteria.normalized().unwrap();
        assert!(normalized.name.is_none());
        assert_eq!(normalized.surname.as_deref(), Some("Ivanov"));
        assert_eq!(normalized.gender, Some(Gender::Female));
        assert_eq!(normalized.nationality.unwrap().as_str(), "ua");
    }

    #[test]
    fn inverted_age_range_is_rejected() {
        let criteria = FilterCriteria {
            age_min: Some(40),
            age_max: Some(20),
            ..FilterCriteria::first_page()
        };
        assert_eq!(
            criteria.normalized().unwrap_err(),
            PersonValidationError::AgeRangeInverted { min: 40, max: 20 }
        );
    }

    #[test]
    fn criteria_deserialize_with_missing_pagination() {
        let criteria: FilterCriteria = serde_json::from_str(r#"{"name":"Ivan"}"#).unwrap();
        let normalized = criteria.normalized().unwrap();
        assert_eq!(normalized.page, 1);
        assert_eq!(normalized.page_size, PAGE_SIZE_DEFAULT);
    }
}
