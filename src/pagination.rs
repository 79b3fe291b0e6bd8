use serde::{Deserialize, Serialize};

/// Pagination metadata for one server-returned page.
///
/// # Example
/// ```
/// use nftdeck::pagination::Pagination;
///
/// let p = Pagination::derive(2, 20, 45);
/// assert_eq!(p.total_pages, 3);
/// assert!(p.has_next);
/// assert!(p.has_prev);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page (1-based)
    pub page: u32,
    /// Maximum number of items per page
    pub limit: u32,
    /// Total number of items across all pages
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// Compute the full metadata from a page, a limit and a total.
    pub fn derive(page: u32, limit: u32, total_items: u64) -> Self {
        let page = page.max(1);
        let total_pages = if limit == 0 {
            1
        } else {
            u32::try_from(total_items.div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
        };
        Self {
            page,
            limit,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    /// Fill missing fields of a server pagination block using the request
    /// that produced it and the number of items actually returned.
    pub fn from_raw(raw: &RawPagination, requested_page: u32, requested_limit: u32, item_count: usize) -> Self {
        let page = raw.page.unwrap_or(requested_page).max(1);
        let limit = raw.limit.filter(|l| *l > 0).unwrap_or(requested_limit);
        let total_items = raw.total_items.unwrap_or_else(|| {
            u64::from(page.saturating_sub(1)) * u64::from(limit) + item_count as u64
        });

        let derived = Self::derive(page, limit, total_items);
        let total_pages = raw.total_pages.unwrap_or(derived.total_pages);

        Self {
            page,
            limit,
            total_items,
            total_pages,
            has_next: raw.has_next.unwrap_or(page < total_pages),
            has_prev: raw.has_prev.unwrap_or(page > 1),
        }
    }

    /// The largest page number a caller may request.
    ///
    /// An empty result still has a page 1.
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }
}

/// Pagination block exactly as the backend sends it. Every field is
/// optional; both the `totalDocs`/`hasNextPage` and the
/// `totalItems`/`hasNext` spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPagination {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "totalDocs")]
    pub total_items: Option<u64>,
    pub total_pages: Option<u32>,
    #[serde(rename = "hasNextPage", alias = "hasNext")]
    pub has_next: Option<bool>,
    #[serde(rename = "hasPrevPage", alias = "hasPrev")]
    pub has_prev: Option<bool>,
}

/// One server-returned slice of a listing.
///
/// Items keep the server order. A page is replaced wholesale on every
/// successful fetch and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultPage<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> ResultPage<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        Self { items, pagination }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
