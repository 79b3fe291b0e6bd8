mod filter;
mod order;
mod params;

pub use filter::{FilterValue, Filters};
pub use order::SortOrder;
pub use params::{BackendParams, FetchRequest, QueryParams};

use serde::Serialize;

use crate::error::DeckError;

pub const PAGE_KEY: &str = "page";
pub const LIMIT_KEY: &str = "limit";
pub const SORT_BY_KEY: &str = "sortBy";
pub const SORT_ORDER_KEY: &str = "sortOrder";

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// The user-controlled parameters driving one listing fetch.
///
/// Every field except `page` resets `page` to 1 when it changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState<F> {
    pub page: u32,
    pub limit: u32,
    pub filters: F,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl<F: Filters> Default for QueryState<F> {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl<F: Filters> QueryState<F> {
    pub fn new(limit: u32) -> Self {
        QueryState {
            page: 1,
            limit: limit.clamp(1, MAX_LIMIT),
            filters: F::default(),
            sort_by: None,
            sort_order: SortOrder::default(),
        }
    }

    pub fn with_sort(mut self, sort_by: &str, sort_order: SortOrder) -> Result<Self, DeckError> {
        self.sort_by = Some(Self::check_sort_field(sort_by)?);
        self.sort_order = sort_order;
        Ok(self)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Update one field by name. Unknown names are rejected and leave the
    /// state untouched.
    pub fn set(&mut self, key: &str, value: FilterValue) -> Result<(), DeckError> {
        match key {
            PAGE_KEY => {
                let page = value.as_number(key)?;
                if page < 1 {
                    return Err(DeckError::InvalidFilterValue {
                        key: key.into(),
                        reason: "pages start at 1".into(),
                    });
                }
                self.page = page;
                return Ok(());
            }
            LIMIT_KEY => {
                let limit = value.as_number(key)?;
                if !(1..=MAX_LIMIT).contains(&limit) {
                    return Err(DeckError::InvalidFilterValue {
                        key: key.into(),
                        reason: format!("limit must be between 1 and {}", MAX_LIMIT),
                    });
                }
                self.limit = limit;
            }
            SORT_BY_KEY => {
                let field = value.as_text(key)?;
                self.sort_by = if field.is_empty() {
                    None
                } else {
                    Some(Self::check_sort_field(field)?)
                };
            }
            SORT_ORDER_KEY => {
                self.sort_order = value.parse_choice(key)?;
            }
            _ if F::FIELDS.contains(&key) => self.filters.set_field(key, value)?,
            _ => return Err(DeckError::UnknownFilter(key.to_owned())),
        }

        self.page = 1;
        Ok(())
    }

    /// Serialize the full parameter set in backend order: paging first,
    /// then filters, then sorting.
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push(PAGE_KEY, self.page);
        params.push(LIMIT_KEY, self.limit);
        self.filters.append_params(&mut params);
        if let Some(sort_by) = &self.sort_by {
            params.push(SORT_BY_KEY, sort_by);
            params.push(SORT_ORDER_KEY, self.sort_order);
        }
        params
    }

    pub fn to_request(&self) -> FetchRequest {
        FetchRequest {
            page: self.page,
            limit: self.limit,
            params: self.to_params(),
        }
    }

    fn check_sort_field(field: &str) -> Result<String, DeckError> {
        if F::SORT_FIELDS.contains(&field) {
            Ok(field.to_owned())
        } else {
            Err(DeckError::InvalidFilterValue {
                key: SORT_BY_KEY.into(),
                reason: format!(
                    "'{}' is not sortable (expected one of: {})",
                    field,
                    F::SORT_FIELDS.join(", ")
                ),
            })
        }
    }
}
