use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;

use crate::error::DeckError;

use super::params::BackendParams;

/// A value assigned to one query field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FilterValue {
    /// One of a fixed set of UI labels, e.g. `"sale"`
    Choice(String),
    /// Inclusive numeric bounds, either side optional
    Range {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    /// Free text
    Search(String),
    /// Paging numbers (`page`, `limit`)
    Number(u32),
}

impl FilterValue {
    pub fn choice(label: &str) -> Self {
        FilterValue::Choice(label.to_owned())
    }

    pub fn range(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        FilterValue::Range { min, max }
    }

    pub fn as_number(&self, key: &str) -> Result<u32, DeckError> {
        match self {
            FilterValue::Number(n) => Ok(*n),
            other => Err(Self::mismatch(key, "a number", other)),
        }
    }

    /// Choice and search values both carry text.
    pub fn as_text(&self, key: &str) -> Result<&str, DeckError> {
        match self {
            FilterValue::Choice(s) | FilterValue::Search(s) => Ok(s.as_str()),
            other => Err(Self::mismatch(key, "text", other)),
        }
    }

    pub fn as_range(&self, key: &str) -> Result<(Option<Decimal>, Option<Decimal>), DeckError> {
        match self {
            FilterValue::Range { min, max } => Ok((*min, *max)),
            other => Err(Self::mismatch(key, "a range", other)),
        }
    }

    /// Parse a choice label into its typed form.
    pub fn parse_choice<T: FromStr>(&self, key: &str) -> Result<T, DeckError> {
        let label = match self {
            FilterValue::Choice(s) => s.as_str(),
            other => return Err(Self::mismatch(key, "a choice", other)),
        };
        label
            .trim()
            .to_ascii_lowercase()
            .parse::<T>()
            .map_err(|_| DeckError::InvalidFilterValue {
                key: key.into(),
                reason: format!("'{}' is not a valid choice", label),
            })
    }

    fn mismatch(key: &str, expected: &str, found: &FilterValue) -> DeckError {
        DeckError::InvalidFilterValue {
            key: key.into(),
            reason: format!("expected {}, found {:?}", expected, found),
        }
    }
}

/// A screen's filter fields. Implementations own the mapping from field
/// names to typed values and from typed values to backend parameters.
pub trait Filters: BackendParams + Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Field names accepted by `set_field`.
    const FIELDS: &'static [&'static str];

    /// Field names the backend accepts for `sortBy`.
    const SORT_FIELDS: &'static [&'static str];

    fn set_field(&mut self, key: &str, value: FilterValue) -> Result<(), DeckError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;

    #[test]
    fn test_parse_choice_is_case_insensitive() {
        let order: SortOrder = FilterValue::choice(" ASC ").parse_choice("sortOrder").unwrap();
        assert_eq!(order, SortOrder::Asc);
    }

    #[test]
    fn test_wrong_kind_reports_key() {
        let err = FilterValue::Number(3).as_text("search").unwrap_err();
        assert!(err.to_string().contains("'search'"));
        assert!(FilterValue::choice("x").as_range("price").is_err());
    }
}
