//! UI filter values and their backend meaning.
//!
//! Each screen's filter set is defined once here. CLI flags, programmatic
//! callers and query serialization all go through these types, so a UI
//! label cannot drift from the parameter the backend expects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::DeckError;
use crate::nfts::Rarity;
use crate::query::{BackendParams, FilterValue, Filters, QueryParams};
use crate::transactions::{TransactionKind, TransactionStatus};

/// Listing state of an owned NFT.
///
/// | UI label     | backend          |
/// |--------------|------------------|
/// | `all`        | (omitted)        |
/// | `sale`       | `isListed=true`  |
/// | `not-listed` | `isListed=false` |
#[derive(
    AsRefStr, EnumIter, EnumString, Display, Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ListingFilter {
    #[default]
    All,
    Sale,
    NotListed,
}

impl ListingFilter {
    pub const PARAM: &'static str = "isListed";

    pub fn is_listed(&self) -> Option<bool> {
        match self {
            ListingFilter::All => None,
            ListingFilter::Sale => Some(true),
            ListingFilter::NotListed => Some(false),
        }
    }
}

impl BackendParams for ListingFilter {
    fn append_params(&self, params: &mut QueryParams) {
        params.push_opt(Self::PARAM, self.is_listed());
    }
}

/// An enum whose labels are sent to the backend as-is under one parameter.
pub trait ChoiceParam: AsRef<str> + FromStr + Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    const PARAM: &'static str;

    /// Decode-only variants (e.g. `Unknown`) cannot be selected as filters.
    fn selectable(&self) -> bool {
        true
    }
}

impl ChoiceParam for Rarity {
    const PARAM: &'static str = "rarity";

    fn selectable(&self) -> bool {
        *self != Rarity::Unknown
    }
}

impl ChoiceParam for TransactionKind {
    const PARAM: &'static str = "type";

    fn selectable(&self) -> bool {
        *self != TransactionKind::Unknown
    }
}

impl ChoiceParam for TransactionStatus {
    const PARAM: &'static str = "status";

    fn selectable(&self) -> bool {
        *self != TransactionStatus::Unknown
    }
}

/// `all`, or exactly one value of `T`. Serializes as its UI label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice<T> {
    All,
    Only(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: ChoiceParam> FromStr for Choice<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Choice::All);
        }
        match T::from_str(s) {
            Ok(value) if value.selectable() => Ok(Choice::Only(value)),
            _ => Err(format!("invalid {} '{}'", T::PARAM, s)),
        }
    }
}

impl<T: ChoiceParam> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::All => write!(f, "all"),
            Choice::Only(value) => write!(f, "{}", value.as_ref()),
        }
    }
}

impl<T: ChoiceParam> Serialize for Choice<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<T: ChoiceParam> BackendParams for Choice<T> {
    fn append_params(&self, params: &mut QueryParams) {
        if let Choice::Only(value) = self {
            params.push(T::PARAM, value.as_ref());
        }
    }
}

/// Inclusive price bounds. Bounds given in the wrong order are swapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    min: Option<Decimal>,
    max: Option<Decimal>,
}

impl PriceRange {
    pub const MIN_PARAM: &'static str = "minPrice";
    pub const MAX_PARAM: &'static str = "maxPrice";

    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Result<Self, DeckError> {
        for bound in [min, max].into_iter().flatten() {
            if bound.is_sign_negative() {
                return Err(DeckError::InvalidFilterValue {
                    key: "price".into(),
                    reason: format!("price bound {} is negative", bound),
                });
            }
        }
        let (min, max) = match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
            bounds => bounds,
        };
        Ok(PriceRange { min, max })
    }

    pub fn min(&self) -> Option<Decimal> {
        self.min
    }

    pub fn max(&self) -> Option<Decimal> {
        self.max
    }
}

impl BackendParams for PriceRange {
    fn append_params(&self, params: &mut QueryParams) {
        params.push_opt(Self::MIN_PARAM, self.min);
        params.push_opt(Self::MAX_PARAM, self.max);
    }
}

/// Free-text search, trimmed. Blank text means no search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchText(String);

impl SearchText {
    pub const PARAM: &'static str = "search";

    pub fn new(text: &str) -> Self {
        SearchText(text.trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl BackendParams for SearchText {
    fn append_params(&self, params: &mut QueryParams) {
        if !self.is_empty() {
            params.push(Self::PARAM, &self.0);
        }
    }
}

fn unknown_field(key: &str) -> DeckError {
    DeckError::UnknownFilter(key.to_owned())
}

/// Filters of the "my collection" screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionFilters {
    pub status: ListingFilter,
    pub search: SearchText,
}

impl BackendParams for CollectionFilters {
    fn append_params(&self, params: &mut QueryParams) {
        self.status.append_params(params);
        self.search.append_params(params);
    }
}

impl Filters for CollectionFilters {
    const FIELDS: &'static [&'static str] = &["status", "search"];
    const SORT_FIELDS: &'static [&'static str] = &["createdAt", "price", "name"];

    fn set_field(&mut self, key: &str, value: FilterValue) -> Result<(), DeckError> {
        match key {
            "status" => self.status = value.parse_choice(key)?,
            "search" => self.search = SearchText::new(value.as_text(key)?),
            _ => return Err(unknown_field(key)),
        }
        Ok(())
    }
}

/// Filters of the marketplace browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketFilters {
    pub rarity: Choice<Rarity>,
    pub price: PriceRange,
    pub search: SearchText,
}

impl BackendParams for MarketFilters {
    fn append_params(&self, params: &mut QueryParams) {
        self.rarity.append_params(params);
        self.price.append_params(params);
        self.search.append_params(params);
    }
}

impl Filters for MarketFilters {
    const FIELDS: &'static [&'static str] = &["rarity", "price", "search"];
    const SORT_FIELDS: &'static [&'static str] = &["price", "createdAt", "rarity"];

    fn set_field(&mut self, key: &str, value: FilterValue) -> Result<(), DeckError> {
        match key {
            "rarity" => self.rarity = value.parse_choice(key)?,
            "price" => {
                let (min, max) = value.as_range(key)?;
                self.price = PriceRange::new(min, max)?;
            }
            "search" => self.search = SearchText::new(value.as_text(key)?),
            _ => return Err(unknown_field(key)),
        }
        Ok(())
    }
}

/// Filters of the transaction history screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionFilters {
    pub kind: Choice<TransactionKind>,
    pub status: Choice<TransactionStatus>,
}

impl BackendParams for TransactionFilters {
    fn append_params(&self, params: &mut QueryParams) {
        self.kind.append_params(params);
        self.status.append_params(params);
    }
}

impl Filters for TransactionFilters {
    const FIELDS: &'static [&'static str] = &["type", "status"];
    const SORT_FIELDS: &'static [&'static str] = &["createdAt", "amount"];

    fn set_field(&mut self, key: &str, value: FilterValue) -> Result<(), DeckError> {
        match key {
            "type" => self.kind = value.parse_choice(key)?,
            "status" => self.status = value.parse_choice(key)?,
            _ => return Err(unknown_field(key)),
        }
        Ok(())
    }
}
