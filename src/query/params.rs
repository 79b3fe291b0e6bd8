use std::fmt::Display;

/// Ordered `key=value` pairs sent as the request query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Display) {
        self.pairs.push((key.to_owned(), value.to_string()));
    }

    pub fn push_opt(&mut self, key: &str, value: Option<impl Display>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

/// Translation from a UI-facing filter value to backend query parameters.
///
/// Implementations are the single place where a UI label is given its
/// backend meaning; values that mean "no restriction" append nothing.
pub trait BackendParams {
    fn append_params(&self, params: &mut QueryParams);
}

impl<T: BackendParams> BackendParams for Option<T> {
    fn append_params(&self, params: &mut QueryParams) {
        if let Some(inner) = self {
            inner.append_params(params);
        }
    }
}

/// Everything a fetcher needs for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub page: u32,
    pub limit: u32,
    pub params: QueryParams,
}
