use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::DeckError;
use crate::pagination::{Pagination, RawPagination, ResultPage};

/// The `{success, data, message, error}` wrapper used by every backend
/// response. `data` stays untyped until `success` has been checked so that
/// a failure body with an odd `data` still surfaces the server message.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageData<T> {
    #[serde(alias = "docs")]
    items: Vec<T>,
    #[serde(default)]
    pagination: RawPagination,
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self, DeckError> {
        serde_json::from_slice(body)
            .map_err(|e| DeckError::UnexpectedShape(format!("body is not an envelope: {}", e)))
    }

    /// The payload of a successful envelope, or the matching error.
    pub fn into_data(self) -> Result<Value, DeckError> {
        match self.success {
            Some(true) => self
                .data
                .ok_or_else(|| DeckError::UnexpectedShape("successful response without data".into())),
            Some(false) => Err(DeckError::backend(self.message.or(self.error))),
            None => Err(DeckError::UnexpectedShape("missing 'success' flag".into())),
        }
    }

    /// Decode a listing payload into a `ResultPage`.
    ///
    /// A page holding more items than the requested limit, or than the
    /// limit the server reports, is rejected rather than truncated.
    pub fn into_page<T: DeserializeOwned>(
        self,
        requested_page: u32,
        requested_limit: u32,
    ) -> Result<ResultPage<T>, DeckError> {
        let data = self.into_data()?;
        let page_data: PageData<T> = serde_json::from_value(data)
            .map_err(|e| DeckError::UnexpectedShape(format!("invalid listing data: {}", e)))?;

        let pagination = Pagination::from_raw(
            &page_data.pagination,
            requested_page,
            requested_limit,
            page_data.items.len(),
        );

        let limit = requested_limit.min(pagination.limit);
        if page_data.items.len() > limit as usize {
            return Err(DeckError::UnexpectedShape(format!(
                "page holds {} items but limit is {}",
                page_data.items.len(),
                limit
            )));
        }

        Ok(ResultPage::new(page_data.items, pagination))
    }
}
