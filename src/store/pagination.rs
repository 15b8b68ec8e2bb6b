//! Incremental "load more" pagination over a content source
//!
//! The controller owns the cursor, the [`PostStore`] owns the posts.
//! `load_more` follows the cursor exactly once, and only appends to
//! the store after the whole page has been fetched and mapped: a
//! failed load leaves both store and cursor as they were.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::PostStore;
use crate::config::CmsConfig;
use crate::content::{Post, QueryPage};
use crate::source::{ContentSource, QueryRequest, SourceError};

/// Opaque pointer to the next page, `None` once exhausted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationCursor {
    pub next_page_url: Option<String>,
}

impl PaginationCursor {
    pub fn new(next_page_url: Option<String>) -> Self {
        Self { next_page_url }
    }

    /// A cursor with nothing after it
    pub fn exhausted() -> Self {
        Self::default()
    }
}

/// The page a listing session starts from
#[derive(Debug, Clone, Default)]
pub struct FirstPage {
    pub posts: Vec<Post>,
    pub cursor: PaginationCursor,
}

impl From<QueryPage> for FirstPage {
    fn from(page: QueryPage) -> Self {
        Self {
            posts: page.results.iter().map(Post::from).collect(),
            cursor: PaginationCursor::new(page.next_page),
        }
    }
}

/// Why `load_more` did not append anything
#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    #[error("no more pages to load")]
    Exhausted,

    #[error("a page load is already in flight")]
    InFlight,

    #[error("listing was re-initialized while the page was loading")]
    Superseded,

    #[error("upstream failure: {0}")]
    Upstream(#[from] SourceError),
}

#[derive(Debug, Default)]
struct CursorState {
    cursor: PaginationCursor,
    /// Bumped by `initialize`, so a load started in an older session
    /// never lands in a newer one
    session: u64,
}

/// Drives "load more" pagination into a [`PostStore`]
pub struct PaginationController {
    store: PostStore,
    source: Arc<dyn ContentSource>,
    state: Mutex<CursorState>,
    in_flight: AtomicBool,
}

impl PaginationController {
    /// Create a controller over an existing store; nothing is loaded yet
    pub fn new(store: PostStore, source: Arc<dyn ContentSource>) -> Self {
        Self {
            store,
            source,
            state: Mutex::new(CursorState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Query the first listing page and seed the store with it
    pub async fn load_first_page(
        store: PostStore,
        source: Arc<dyn ContentSource>,
        config: &CmsConfig,
        preview_ref: Option<String>,
    ) -> Result<Self, PaginationError> {
        let request = QueryRequest::listing(config, preview_ref);
        let page = source.query(&request).await?;
        tracing::debug!(
            "First page: {} posts, {} pages in total",
            page.results.len(),
            page.total_pages
        );

        let controller = Self::new(store, source);
        controller.initialize(page.into());
        Ok(controller)
    }

    /// Seed the store with a first page and take its cursor
    pub fn initialize(&self, first_page: FirstPage) {
        let mut state = self.state();
        self.store.set_posts(first_page.posts);
        state.cursor = first_page.cursor;
        state.session += 1;
    }

    /// Fetch the next page and append it to the store
    ///
    /// Returns the number of posts appended. Fails with
    /// [`PaginationError::Exhausted`] without fetching when there is no
    /// next page, and with [`PaginationError::InFlight`] while another
    /// call is still waiting on its page.
    pub async fn load_more(&self) -> Result<usize, PaginationError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(PaginationError::InFlight)?;

        let (url, session) = {
            let state = self.state();
            match &state.cursor.next_page_url {
                Some(url) => (url.clone(), state.session),
                None => return Err(PaginationError::Exhausted),
            }
        };

        tracing::debug!("Loading more posts from {}", url);
        let page = self.source.fetch_page(&url).await?;
        let next = FirstPage::from(page);
        let count = next.posts.len();

        let mut state = self.state();
        if state.session != session {
            return Err(PaginationError::Superseded);
        }
        self.store.append(next.posts);
        state.cursor = next.cursor;

        tracing::debug!(
            "Appended {} posts ({} total, more: {})",
            count,
            self.store.total_posts(),
            state.cursor.next_page_url.is_some()
        );
        Ok(count)
    }

    /// Keep loading until the cursor is exhausted
    pub async fn load_all(&self) -> Result<usize, PaginationError> {
        let mut loaded = 0;
        while self.has_more() {
            loaded += self.load_more().await?;
        }
        Ok(loaded)
    }

    /// Whether another page can be loaded
    pub fn has_more(&self) -> bool {
        self.state().cursor.next_page_url.is_some()
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.state().cursor.clone()
    }

    /// The store this controller appends to
    pub fn store(&self) -> &PostStore {
        &self.store
    }

    fn state(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds the in-flight flag; released on drop, including when the
/// `load_more` future is dropped mid-fetch
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::RawPost;
    use crate::source::memory_tests::raw;
    use crate::source::MemorySource;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Serves a fixed page for any URL, or fails when told to
    struct ScriptedSource {
        page: Vec<RawPost>,
        next: Option<String>,
        fail: bool,
    }

    #[async_trait]
    impl ContentSource for ScriptedSource {
        async fn query(&self, _request: &QueryRequest) -> Result<QueryPage, SourceError> {
            unreachable!("tests seed the controller directly")
        }

        async fn fetch_page(&self, url: &str) -> Result<QueryPage, SourceError> {
            if self.fail {
                return Err(SourceError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            let mut page = QueryPage::last(self.page.clone());
            page.next_page = self.next.clone();
            Ok(page)
        }

        async fn get_by_uid(
            &self,
            _document_type: &str,
            _uid: &str,
            _preview_ref: Option<&str>,
        ) -> Result<Option<RawPost>, SourceError> {
            Ok(None)
        }

        async fn resolve_preview(
            &self,
            _token: &str,
            _document_id: &str,
        ) -> Result<Option<String>, SourceError> {
            Ok(None)
        }
    }

    /// Wraps a source and parks every `fetch_page` until released
    struct GatedSource {
        inner: MemorySource,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ContentSource for GatedSource {
        async fn query(&self, request: &QueryRequest) -> Result<QueryPage, SourceError> {
            self.inner.query(request).await
        }

        async fn fetch_page(&self, url: &str) -> Result<QueryPage, SourceError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.fetch_page(url).await
        }

        async fn get_by_uid(
            &self,
            document_type: &str,
            uid: &str,
            preview_ref: Option<&str>,
        ) -> Result<Option<RawPost>, SourceError> {
            self.inner.get_by_uid(document_type, uid, preview_ref).await
        }

        async fn resolve_preview(
            &self,
            token: &str,
            document_id: &str,
        ) -> Result<Option<String>, SourceError> {
            self.inner.resolve_preview(token, document_id).await
        }
    }

    fn scripted(page: &[&str], next: Option<&str>, fail: bool) -> Arc<dyn ContentSource> {
        Arc::new(ScriptedSource {
            page: page.iter().map(|uid| raw(uid, &uid.to_uppercase())).collect(),
            next: next.map(str::to_string),
            fail,
        })
    }

    fn first_page(uids: &[&str], next: Option<&str>) -> FirstPage {
        FirstPage {
            posts: uids
                .iter()
                .map(|uid| Post::new(*uid, uid.to_uppercase()))
                .collect(),
            cursor: PaginationCursor::new(next.map(str::to_string)),
        }
    }

    fn uids(store: &PostStore) -> Vec<String> {
        store.posts().into_iter().map(|p| p.uid).collect()
    }

    fn cms(page_size: usize) -> CmsConfig {
        CmsConfig {
            page_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_initialize_seeds_store() {
        let store = PostStore::new();
        let controller = PaginationController::new(store.clone(), scripted(&[], None, false));

        controller.initialize(first_page(&["a", "b"], Some("/p2")));
        assert_eq!(uids(&store), vec!["a", "b"]);
        assert!(controller.has_more());
        assert_eq!(controller.cursor().next_page_url.as_deref(), Some("/p2"));

        controller.initialize(first_page(&["c"], None));
        assert_eq!(uids(&store), vec!["c"]);
        assert!(!controller.has_more());
    }

    #[tokio::test]
    async fn test_load_more_appends_then_exhausts() {
        let store = PostStore::new();
        let controller = PaginationController::new(store.clone(), scripted(&["b"], None, false));
        controller.initialize(first_page(&["a"], Some("/p2")));

        assert_eq!(controller.load_more().await.unwrap(), 1);
        assert_eq!(uids(&store), vec!["a", "b"]);
        assert!(!controller.has_more());

        let err = controller.load_more().await.unwrap_err();
        assert!(matches!(err, PaginationError::Exhausted));
        assert_eq!(uids(&store), vec!["a", "b"]);
        assert_eq!(controller.cursor(), PaginationCursor::exhausted());
    }

    #[tokio::test]
    async fn test_concatenation_keeps_new_cursor() {
        let store = PostStore::new();
        let controller =
            PaginationController::new(store.clone(), scripted(&["c", "d"], Some("/p3"), false));
        controller.initialize(first_page(&["a", "b"], Some("/p2")));

        controller.load_more().await.unwrap();
        assert_eq!(uids(&store), vec!["a", "b", "c", "d"]);
        assert!(controller.has_more());
        assert_eq!(controller.cursor().next_page_url.as_deref(), Some("/p3"));
        assert_eq!(store.get_next_post("b").unwrap().uid, "c");
        assert_eq!(store.get_previous_post("c").unwrap().uid, "b");
    }

    #[tokio::test]
    async fn test_exhausted_never_fetches() {
        // The source would fail if it were called
        let store = PostStore::new();
        let controller = PaginationController::new(store.clone(), scripted(&[], None, true));
        controller.initialize(first_page(&["a"], None));

        let err = controller.load_more().await.unwrap_err();
        assert!(matches!(err, PaginationError::Exhausted));
        assert_eq!(uids(&store), vec!["a"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_state_intact() {
        let store = PostStore::new();
        let controller = PaginationController::new(store.clone(), scripted(&["b"], None, true));
        controller.initialize(first_page(&["a"], Some("/p2")));

        let err = controller.load_more().await.unwrap_err();
        assert!(matches!(
            err,
            PaginationError::Upstream(SourceError::Status { status: 503, .. })
        ));
        assert_eq!(uids(&store), vec!["a"]);
        assert!(controller.has_more());
        assert_eq!(controller.cursor().next_page_url.as_deref(), Some("/p2"));
    }

    #[tokio::test]
    async fn test_load_first_page_and_drain() {
        let source: Arc<dyn ContentSource> = Arc::new(MemorySource::new(vec![
            raw("a", "A"),
            raw("b", "B"),
            raw("c", "C"),
            raw("d", "D"),
            raw("e", "E"),
        ]));
        let store = PostStore::new();
        let controller =
            PaginationController::load_first_page(store.clone(), source, &cms(2), None)
                .await
                .unwrap();

        assert_eq!(uids(&store), vec!["a", "b"]);
        assert!(controller.has_more());

        assert_eq!(controller.load_all().await.unwrap(), 3);
        assert_eq!(uids(&store), vec!["a", "b", "c", "d", "e"]);
        assert!(!controller.has_more());
    }

    #[tokio::test]
    async fn test_overlapping_load_is_rejected() {
        let source = Arc::new(GatedSource {
            inner: MemorySource::new(vec![raw("a", "A"), raw("b", "B")]),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = PostStore::new();
        let controller = Arc::new(
            PaginationController::load_first_page(store.clone(), source.clone(), &cms(1), None)
                .await
                .unwrap(),
        );

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_more().await }
        });
        source.entered.notified().await;

        let err = controller.load_more().await.unwrap_err();
        assert!(matches!(err, PaginationError::InFlight));

        source.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(uids(&store), vec!["a", "b"]);

        // The flag is released once the first load completes
        assert!(matches!(
            controller.load_more().await.unwrap_err(),
            PaginationError::Exhausted
        ));
    }

    #[tokio::test]
    async fn test_dropped_load_releases_guard() {
        let source = Arc::new(GatedSource {
            inner: MemorySource::new(vec![raw("a", "A"), raw("b", "B")]),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = PostStore::new();
        let controller = Arc::new(
            PaginationController::load_first_page(store.clone(), source.clone(), &cms(1), None)
                .await
                .unwrap(),
        );

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_more().await }
        });
        source.entered.notified().await;
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(uids(&store), vec!["a"]);

        source.release.notify_one();
        assert_eq!(controller.load_more().await.unwrap(), 1);
        assert_eq!(uids(&store), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_reinitialize_supersedes_in_flight_load() {
        let source = Arc::new(GatedSource {
            inner: MemorySource::new(vec![raw("a", "A"), raw("b", "B")]),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = PostStore::new();
        let controller = Arc::new(
            PaginationController::load_first_page(store.clone(), source.clone(), &cms(1), None)
                .await
                .unwrap(),
        );

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_more().await }
        });
        source.entered.notified().await;

        controller.initialize(first_page(&["x"], None));
        source.release.notify_one();

        assert!(matches!(
            first.await.unwrap().unwrap_err(),
            PaginationError::Superseded
        ));
        assert_eq!(uids(&store), vec!["x"]);
        assert!(!controller.has_more());
    }
}
