//! Fetch-filter-paginate controller for one listing view.
//!
//! A `PagedQuery` owns the query parameters of a screen, issues a fetch on
//! every change and keeps the last good page on screen when a refresh
//! fails. Every fetch is numbered; only the response to the most recently
//! issued fetch is applied, whatever order responses arrive in.

use log::{debug, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::error::DeckError;
use crate::pagination::{Pagination, ResultPage};
use crate::query::{FetchRequest, FilterValue, Filters, QueryState, PAGE_KEY};
use crate::service::PageFetcher;
use crate::stats::Aggregate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Everything a view renders. Published on every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryView<F, T, A> {
    pub query: QueryState<F>,
    pub items: Vec<T>,
    pub stats: A,
    pub status: RequestStatus,
    pub error: Option<String>,
    /// `None` until the first successful fetch
    pub pagination: Option<Pagination>,
}

impl<F, T, A: Default> QueryView<F, T, A> {
    fn empty(query: QueryState<F>) -> Self {
        QueryView {
            query,
            items: Vec::new(),
            stats: A::default(),
            status: RequestStatus::Idle,
            error: None,
            pagination: None,
        }
    }
}

struct Inner<F, T, A> {
    view: QueryView<F, T, A>,
    latest_seq: u64,
}

pub struct PagedQuery<F, T, A> {
    fetcher: Arc<dyn PageFetcher<T>>,
    defaults: QueryState<F>,
    inner: Mutex<Inner<F, T, A>>,
    publisher: watch::Sender<QueryView<F, T, A>>,
}

impl<F, T, A> PagedQuery<F, T, A>
where
    F: Filters,
    T: Clone + Send + Sync + 'static,
    A: Aggregate<T>,
{
    /// Create a controller without fetching. `initial` is also what
    /// `reset_filters` restores.
    pub fn new(fetcher: Arc<dyn PageFetcher<T>>, initial: QueryState<F>) -> Self {
        let view = QueryView::empty(initial.clone());
        let (publisher, _) = watch::channel(view.clone());
        PagedQuery {
            fetcher,
            defaults: initial,
            inner: Mutex::new(Inner {
                view,
                latest_seq: 0,
            }),
            publisher,
        }
    }

    /// Create a controller and run the initial fetch.
    pub async fn mount(fetcher: Arc<dyn PageFetcher<T>>, initial: QueryState<F>) -> Self {
        let query = Self::new(fetcher, initial);
        query.refetch().await;
        query
    }

    /// Set one query field by name. Any field other than `page` resets the
    /// page to 1.
    ///
    /// Returns an error only for rejected input, in which case nothing is
    /// fetched. Fetch failures are reported through the view.
    pub async fn set_filter(&self, key: &str, value: FilterValue) -> Result<(), DeckError> {
        if key == PAGE_KEY {
            let page = value.as_number(key)?;
            return self.set_page(page).await;
        }
        self.issue(|query, _| query.set(key, value)).await
    }

    /// Move to page `page`. Pages outside `1..=total_pages` are rejected,
    /// never clamped. Before the first successful fetch only the lower
    /// bound is checked.
    pub async fn set_page(&self, page: u32) -> Result<(), DeckError> {
        self.issue(|query, pagination| {
            let last_page = pagination.map(|p| p.last_page());
            let out_of_range = page < 1 || last_page.is_some_and(|last| page > last);
            if out_of_range {
                return Err(DeckError::PageOutOfRange {
                    requested: page,
                    total_pages: last_page.unwrap_or(1),
                });
            }
            query.page = page;
            Ok(())
        })
        .await
    }

    /// Restore filters and sorting to their initial values and go back to
    /// page 1. The page size is kept.
    pub async fn reset_filters(&self) {
        let (seq, request) = {
            let mut inner = self.lock();
            let mut query = inner.view.query.clone();
            query.filters = self.defaults.filters.clone();
            query.sort_by = self.defaults.sort_by.clone();
            query.sort_order = self.defaults.sort_order;
            query.page = 1;
            self.start(&mut inner, query)
        };
        self.complete(seq, request).await;
    }

    /// Fetch again with unchanged parameters, e.g. after a mutation made
    /// elsewhere.
    pub async fn refetch(&self) {
        let (seq, request) = {
            let mut inner = self.lock();
            let query = inner.view.query.clone();
            self.start(&mut inner, query)
        };
        self.complete(seq, request).await;
    }

    pub fn snapshot(&self) -> QueryView<F, T, A> {
        self.lock().view.clone()
    }

    /// Receive every published view. The receiver starts at the current one.
    pub fn subscribe(&self) -> watch::Receiver<QueryView<F, T, A>> {
        self.publisher.subscribe()
    }

    pub fn query(&self) -> QueryState<F> {
        self.lock().view.query.clone()
    }

    pub fn status(&self) -> RequestStatus {
        self.lock().view.status
    }

    pub fn error(&self) -> Option<String> {
        self.lock().view.error.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().view.items.clone()
    }

    pub fn stats(&self) -> A {
        self.lock().view.stats.clone()
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.lock().view.pagination
    }

    // A poisoned lock only means another caller panicked mid-update; the
    // view itself is always replaced whole, so keep using it.
    fn lock(&self) -> MutexGuard<'_, Inner<F, T, A>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &Inner<F, T, A>) {
        self.publisher.send_replace(inner.view.clone());
    }

    /// Apply `mutate` to a copy of the query, and if it accepts, make that
    /// the current query and fetch it.
    async fn issue<M>(&self, mutate: M) -> Result<(), DeckError>
    where
        M: FnOnce(&mut QueryState<F>, Option<&Pagination>) -> Result<(), DeckError>,
    {
        let (seq, request) = {
            let mut inner = self.lock();
            let mut query = inner.view.query.clone();
            mutate(&mut query, inner.view.pagination.as_ref())?;
            self.start(&mut inner, query)
        };
        self.complete(seq, request).await;
        Ok(())
    }

    fn start(&self, inner: &mut Inner<F, T, A>, query: QueryState<F>) -> (u64, FetchRequest) {
        inner.latest_seq += 1;
        inner.view.query = query;
        inner.view.status = RequestStatus::Loading;
        inner.view.error = None;
        self.publish(inner);
        (inner.latest_seq, inner.view.query.to_request())
    }

    async fn complete(&self, seq: u64, request: FetchRequest) {
        debug!("Issuing fetch #{} with {:?}", seq, request.params);
        let result = self.fetcher.fetch_page(&request).await;

        let mut inner = self.lock();
        if seq != inner.latest_seq {
            debug!(
                "Discarding response to fetch #{} (latest is #{})",
                seq, inner.latest_seq
            );
            return;
        }

        match result {
            Ok(page) => Self::apply_page(&mut inner.view, page),
            Err(e) => {
                warn!("Fetch #{} failed: {}", seq, e);
                inner.view.status = RequestStatus::Error;
                inner.view.error = Some(e.user_message());
            }
        }
        self.publish(&inner);
    }

    fn apply_page(view: &mut QueryView<F, T, A>, page: ResultPage<T>) {
        view.stats = A::compute(&page.items);
        view.items = page.items;
        // Follow the server if it clamped the page
        view.query.page = page.pagination.page;
        view.pagination = Some(page.pagination);
        view.status = RequestStatus::Success;
        view.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{CollectionFilters, ListingFilter};
    use crate::nfts::{Nft, Rarity};
    use crate::query::{SortOrder, LIMIT_KEY};
    use crate::stats::CollectionStats;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    type Responder =
        Box<dyn Fn(&FetchRequest) -> (Duration, Result<ResultPage<Nft>, DeckError>) + Send + Sync>;

    /// Answers from a closure after a per-request delay, recording requests.
    struct ScriptedBackend {
        requests: Mutex<Vec<FetchRequest>>,
        respond: Responder,
    }

    impl ScriptedBackend {
        fn new(respond: Responder) -> Arc<Self> {
            Arc::new(ScriptedBackend {
                requests: Mutex::new(Vec::new()),
                respond,
            })
        }

        fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher<Nft> for ScriptedBackend {
        async fn fetch_page(&self, request: &FetchRequest) -> Result<ResultPage<Nft>, DeckError> {
            self.requests.lock().unwrap().push(request.clone());
            let (delay, result) = (self.respond)(request);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn nft(id: String, listed: bool) -> Nft {
        Nft {
            token_id: id.clone(),
            name: format!("NFT {}", id),
            id,
            image: None,
            collection: None,
            rarity: Rarity::Common,
            tier: None,
            price: Some("1".parse().unwrap()),
            is_listed: listed,
            owner: None,
            created_at: None,
        }
    }

    /// A backend holding `total` NFTs; odd ids are listed. Honors page,
    /// limit and isListed.
    fn collection_of(total: usize) -> impl Fn(&FetchRequest) -> Result<ResultPage<Nft>, DeckError> {
        move |request| {
            let listed = request.params.get("isListed").map(|v| v == "true");
            let all: Vec<Nft> = (0..total)
                .map(|i| nft(format!("{}", i), i % 2 == 1))
                .filter(|n| listed.map_or(true, |l| n.is_listed == l))
                .collect();
            let limit = request.limit as usize;
            let start = (request.page as usize - 1) * limit;
            let items: Vec<Nft> = all.iter().skip(start).take(limit).cloned().collect();
            Ok(ResultPage::new(
                items,
                Pagination::derive(request.page, request.limit, all.len() as u64),
            ))
        }
    }

    fn instant(
        f: impl Fn(&FetchRequest) -> Result<ResultPage<Nft>, DeckError> + Send + Sync + 'static,
    ) -> Responder {
        Box::new(move |r| (Duration::ZERO, f(r)))
    }

    type CollectionQuery = PagedQuery<CollectionFilters, Nft, CollectionStats>;

    fn initial() -> QueryState<CollectionFilters> {
        QueryState::new(20)
    }

    #[tokio::test]
    async fn test_new_is_idle_until_mounted() {
        let backend = ScriptedBackend::new(instant(collection_of(8)));
        let query = CollectionQuery::new(backend.clone(), initial());
        assert_eq!(query.status(), RequestStatus::Idle);
        assert!(query.items().is_empty());
        assert_eq!(query.stats(), CollectionStats::default());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_mount_single_page() {
        let backend = ScriptedBackend::new(instant(collection_of(8)));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;

        let view = query.snapshot();
        assert_eq!(view.items.len(), 8);
        assert_eq!(view.status, RequestStatus::Success);
        assert_eq!(view.error, None);
        let pagination = view.pagination.unwrap();
        assert!(!pagination.has_next);
        assert_eq!(pagination.total_pages, 1);
        assert_eq!(view.stats.total, 8);
        assert_eq!(view.stats.on_sale, 4);
        assert_eq!(view.stats.not_listed, 4);

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].params.get("page"), Some("1"));
        assert_eq!(requests[0].params.get("limit"), Some("20"));
        assert!(!requests[0].params.contains("isListed"));
    }

    #[tokio::test]
    async fn test_near_max_prices_do_not_break_mount() {
        let backend = ScriptedBackend::new(instant(|request: &FetchRequest| {
            let items: Vec<Nft> = (0..2)
                .map(|i| Nft {
                    price: Some(rust_decimal::Decimal::MAX),
                    ..nft(format!("{}", i), true)
                })
                .collect();
            Ok(ResultPage::new(items, Pagination::derive(request.page, request.limit, 2)))
        }));
        let query = CollectionQuery::mount(backend, initial()).await;

        let view = query.snapshot();
        assert_eq!(view.status, RequestStatus::Success);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.stats.on_sale, 2);
        assert_eq!(view.stats.listed_value, rust_decimal::Decimal::MAX);
    }

    #[tokio::test]
    async fn test_filter_change_from_page_three_goes_to_page_one() {
        let backend = ScriptedBackend::new(instant(collection_of(100)));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;
        query.set_page(3).await.unwrap();
        assert_eq!(query.query().page, 3);

        query
            .set_filter("status", FilterValue::choice("sale"))
            .await
            .unwrap();

        let last = backend.requests().pop().unwrap();
        assert_eq!(last.page, 1);
        assert_eq!(last.params.get("page"), Some("1"));
        assert_eq!(last.params.get("isListed"), Some("true"));

        let view = query.snapshot();
        assert_eq!(view.pagination.unwrap().page, 1);
        assert_eq!(view.query.filters.status, ListingFilter::Sale);
        assert!(view.items.iter().all(|n| n.is_listed));
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_items() {
        let backend = ScriptedBackend::new(instant(|request: &FetchRequest| {
            if request.params.contains("search") {
                Err(DeckError::backend(Some("Unauthorized".into())))
            } else {
                collection_of(8)(request)
            }
        }));
        let query = CollectionQuery::mount(backend, initial()).await;
        let before = query.items();

        query
            .set_filter("search", FilterValue::Search("dragon".into()))
            .await
            .unwrap();

        assert_eq!(query.status(), RequestStatus::Error);
        assert_eq!(query.error().as_deref(), Some("Unauthorized"));
        assert_eq!(query.items(), before);
        assert_eq!(query.stats().total, 8);
    }

    #[tokio::test]
    async fn test_failure_without_message_uses_fallback() {
        let backend = ScriptedBackend::new(instant(|_: &FetchRequest| Err(DeckError::backend(None))));
        let query = CollectionQuery::mount(backend, initial()).await;
        assert_eq!(query.status(), RequestStatus::Error);
        assert_eq!(query.error().as_deref(), Some(crate::error::FALLBACK_BACKEND_MESSAGE));
        assert!(query.items().is_empty());
    }

    #[tokio::test]
    async fn test_success_after_error_clears_error() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let flag = fail.clone();
        let backend = ScriptedBackend::new(instant(move |request: &FetchRequest| {
            if flag.swap(false, std::sync::atomic::Ordering::SeqCst) {
                Err(DeckError::UnexpectedShape("garbage".into()))
            } else {
                collection_of(3)(request)
            }
        }));
        let query = CollectionQuery::mount(backend, initial()).await;
        assert_eq!(query.status(), RequestStatus::Error);

        query.refetch().await;
        assert_eq!(query.status(), RequestStatus::Success);
        assert_eq!(query.error(), None);
        assert_eq!(query.items().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        // Page 2 is slow, the search is fast: the search is issued last
        // but resolves first, and must stay on screen.
        let backend = ScriptedBackend::new(Box::new(|request: &FetchRequest| {
            let delay = if request.page == 2 {
                Duration::from_millis(50)
            } else {
                Duration::from_millis(10)
            };
            (delay, collection_of(60)(request))
        }));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;

        let slow = query.set_page(2);
        let fast = query.set_filter("status", FilterValue::choice("not-listed"));
        let (a, b) = tokio::join!(slow, fast);
        a.unwrap();
        b.unwrap();

        let view = query.snapshot();
        assert_eq!(view.status, RequestStatus::Success);
        assert_eq!(view.query.page, 1);
        assert_eq!(view.query.filters.status, ListingFilter::NotListed);
        assert_eq!(view.pagination.unwrap().page, 1);
        assert!(view.items.iter().all(|n| !n.is_listed));
        assert_eq!(view.items[0].id, "0");

        // Both requests really went out, in issue order
        let pages: Vec<u32> = backend.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_does_not_override_success() {
        let backend = ScriptedBackend::new(Box::new(|request: &FetchRequest| {
            if request.page == 2 {
                (Duration::from_millis(50), Err(DeckError::backend(Some("late".into()))))
            } else {
                (Duration::from_millis(5), collection_of(60)(request))
            }
        }));
        let query = CollectionQuery::mount(backend, initial()).await;

        let (a, b) = tokio::join!(query.set_page(2), query.set_page(3));
        a.unwrap();
        b.unwrap();

        assert_eq!(query.status(), RequestStatus::Success);
        assert_eq!(query.error(), None);
    }

    #[tokio::test]
    async fn test_set_page_rejects_out_of_range() {
        let backend = ScriptedBackend::new(instant(collection_of(45)));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;
        assert_eq!(query.pagination().unwrap().total_pages, 3);

        let err = query.set_page(4).await.unwrap_err();
        assert!(matches!(
            err,
            DeckError::PageOutOfRange {
                requested: 4,
                total_pages: 3
            }
        ));
        assert!(query.set_page(0).await.is_err());
        assert!(query
            .set_filter(PAGE_KEY, FilterValue::Number(9))
            .await
            .is_err());

        // Rejections issue no fetch and leave the view alone
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(query.status(), RequestStatus::Success);
        assert_eq!(query.query().page, 1);

        query.set_page(3).await.unwrap();
        assert_eq!(query.items().len(), 5);
        assert!(query.pagination().unwrap().has_prev);
    }

    #[tokio::test]
    async fn test_empty_result_allows_only_page_one() {
        let backend = ScriptedBackend::new(instant(collection_of(0)));
        let query = CollectionQuery::mount(backend, initial()).await;
        assert_eq!(query.stats(), CollectionStats::default());
        assert!(query.set_page(1).await.is_ok());
        assert!(query.set_page(2).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_filter_is_rejected_without_fetch() {
        let backend = ScriptedBackend::new(instant(collection_of(8)));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;
        let err = query
            .set_filter("rarity", FilterValue::choice("rare"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::UnknownFilter(_)));
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_reproduces_initial_fetch() {
        let backend = ScriptedBackend::new(instant(collection_of(50)));
        let start = initial().with_sort("createdAt", SortOrder::Asc).unwrap();
        let query = CollectionQuery::mount(backend.clone(), start).await;
        let mounted = query.snapshot();

        query.set_filter("status", FilterValue::choice("sale")).await.unwrap();
        query.set_filter("sortOrder", FilterValue::choice("desc")).await.unwrap();
        query.set_page(2).await.unwrap();
        query.reset_filters().await;

        assert_eq!(query.snapshot(), mounted);
        let requests = backend.requests();
        assert_eq!(requests.first().unwrap(), requests.last().unwrap());
    }

    #[tokio::test]
    async fn test_reset_preserves_limit() {
        let backend = ScriptedBackend::new(instant(collection_of(50)));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;
        query.set_filter(LIMIT_KEY, FilterValue::Number(10)).await.unwrap();
        query.set_filter("status", FilterValue::choice("sale")).await.unwrap();
        query.reset_filters().await;

        let view = query.snapshot();
        assert_eq!(view.query.limit, 10);
        assert_eq!(view.query.filters, CollectionFilters::default());
        assert_eq!(view.items.len(), 10);
    }

    #[tokio::test]
    async fn test_refetch_repeats_parameters() {
        let backend = ScriptedBackend::new(instant(collection_of(30)));
        let query = CollectionQuery::mount(backend.clone(), initial()).await;
        query.set_page(2).await.unwrap();
        query.refetch().await;

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1], requests[2]);
    }

    #[tokio::test]
    async fn test_server_clamped_page_is_followed() {
        let backend = ScriptedBackend::new(instant(|_: &FetchRequest| {
            // Always answers with page 1 of 5
            Ok(ResultPage::new(vec![], Pagination::derive(1, 20, 100)))
        }));
        let query = CollectionQuery::mount(backend, initial()).await;
        query.set_page(4).await.unwrap();
        assert_eq!(query.query().page, 1);
        assert_eq!(query.pagination().unwrap().page, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_then_result() {
        let backend = ScriptedBackend::new(instant(collection_of(8)));
        let query = CollectionQuery::new(backend, initial());
        let mut rx = query.subscribe();
        assert_eq!(rx.borrow_and_update().status, RequestStatus::Idle);

        query.refetch().await;
        assert!(rx.has_changed().unwrap());
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.status, RequestStatus::Success);
        assert_eq!(view.items.len(), 8);
    }
}
