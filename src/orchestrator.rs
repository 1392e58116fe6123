//! Search coordination
//!
//! Flow: build URL → fetch → extract → update view state. Fetches run as
//! spawned tasks; their completions come back to the UI thread and are
//! applied with [`SearchOrchestrator::apply_search`]. Every request carries
//! an id and only the most recently issued one is applied, so a slow older
//! response can never overwrite a newer search.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};
use crate::gallery::{GalleryExtractor, GalleryImage, GalleryOptions};
use crate::query::{self, PageTarget};
use crate::records::{DrugRecord, PageLink, PageOutcome, RecordExtractor, Suggestion};
use crate::storage::{PreferenceStore, SearchHistory};
use crate::view_state::{OwnerFilter, ResultViewState, SortKey};

/// Where the current search stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Idle,
    Loading,
    Ready,
    /// The registry said nothing matched
    NoResults,
    /// No rows and no explanation
    Empty,
    /// Transport failure message
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub id: u64,
    pub term: String,
    pub page: u32,
    pub url: String,
}

#[derive(Debug)]
pub struct SearchCompletion {
    pub id: u64,
    pub result: Result<PageOutcome, FetchError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryRequest {
    pub id: u64,
    pub url: String,
    pub title: String,
}

#[derive(Debug)]
pub struct GalleryCompletion {
    pub id: u64,
    pub result: Result<Vec<GalleryImage>, FetchError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryStatus {
    Closed,
    Loading { title: String },
    Ready { title: String, images: Vec<GalleryImage> },
    Failed { title: String, message: String },
}

/// Results shown before a search started; restored if it fails
struct Snapshot {
    records: Vec<DrugRecord>,
    pagination: Vec<PageLink>,
    term: String,
    page: u32,
}

/// Fetch one result page and extract it
pub async fn run_search(
    fetcher: Arc<dyn Fetcher>,
    extractor: RecordExtractor,
    request: SearchRequest,
) -> SearchCompletion {
    let result = fetcher
        .fetch_text(&request.url)
        .await
        .map(|html| extractor.extract_page(&html));
    SearchCompletion {
        id: request.id,
        result,
    }
}

/// Fetch one detail page and extract its gallery
pub async fn run_gallery(
    fetcher: Arc<dyn Fetcher>,
    extractor: GalleryExtractor,
    request: GalleryRequest,
) -> GalleryCompletion {
    let result = fetcher
        .fetch_text(&request.url)
        .await
        .map(|html| extractor.extract_page(&html));
    GalleryCompletion {
        id: request.id,
        result,
    }
}

pub struct SearchOrchestrator {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    records: RecordExtractor,
    gallery: GalleryExtractor,
    view: ResultViewState,
    history: SearchHistory,
    term: String,
    page: u32,
    pagination: Vec<PageLink>,
    suggestions: Vec<Suggestion>,
    status: SearchStatus,
    gallery_status: GalleryStatus,
    latest_search: u64,
    latest_gallery: u64,
    snapshot: Option<Snapshot>,
}

impl SearchOrchestrator {
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>, prefs: Arc<dyn PreferenceStore>) -> Self {
        let gallery_options = GalleryOptions {
            drop_trailing_view_all: config.gallery_drop_trailing,
            ..GalleryOptions::default()
        };

        Self {
            records: RecordExtractor::new(config.base_url.clone()),
            gallery: GalleryExtractor::new(config.base_url.clone(), gallery_options),
            view: ResultViewState::new(prefs.clone()).with_missing_price_policy(config.missing_price),
            history: SearchHistory::load(prefs),
            config,
            fetcher,
            term: String::new(),
            page: 1,
            pagination: Vec::new(),
            suggestions: Vec::new(),
            status: SearchStatus::Idle,
            gallery_status: GalleryStatus::Closed,
            latest_search: 0,
            latest_gallery: 0,
            snapshot: None,
        }
    }

    pub fn view(&self) -> &ResultViewState {
        &self.view
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    pub fn status(&self) -> &SearchStatus {
        &self.status
    }

    pub fn gallery_status(&self) -> &GalleryStatus {
        &self.gallery_status
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn pagination(&self) -> &[PageLink] {
        &self.pagination
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Start a fresh query: history is updated and sort/filter reset
    pub fn submit_query(&mut self, term: &str) -> Option<SearchRequest> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }

        self.history.add(term);
        self.view.reset_preferences();
        Some(self.begin(term.to_string(), 1))
    }

    /// Follow a pagination link, keeping sort and filter
    pub fn goto_page(&mut self, target: &PageTarget) -> Option<SearchRequest> {
        let term = target
            .term_override
            .clone()
            .unwrap_or_else(|| self.term.clone());
        if term.trim().is_empty() {
            return None;
        }
        Some(self.begin(term, target.page))
    }

    /// Go `offset` pages from the current one, if the page links to it
    pub fn step_page(&mut self, offset: i64) -> Option<SearchRequest> {
        let wanted = i64::from(self.page) + offset;
        let target = self
            .pagination
            .iter()
            .find(|link| i64::from(link.target.page) == wanted)?
            .target
            .clone();
        self.goto_page(&target)
    }

    fn begin(&mut self, term: String, page: u32) -> SearchRequest {
        self.latest_search += 1;

        // Only the results on screen before the first pending search are worth restoring
        if self.status != SearchStatus::Loading {
            self.snapshot = Some(Snapshot {
                records: self.view.take_records(),
                pagination: std::mem::take(&mut self.pagination),
                term: self.term.clone(),
                page: self.page,
            });
        } else {
            self.view.take_records();
            self.pagination.clear();
        }
        self.suggestions.clear();

        let url = query::build_search_url(
            &self.config.base_url,
            &self.config.search_path,
            &term,
            page,
            self.config.page_size,
        );
        info!(id = self.latest_search, term = %term, page, "search started");

        self.term = term.clone();
        self.page = page;
        self.status = SearchStatus::Loading;

        SearchRequest {
            id: self.latest_search,
            term,
            page,
            url,
        }
    }

    /// Future performing `request`, ready to be spawned
    pub fn search_task(&self, request: SearchRequest) -> impl Future<Output = SearchCompletion> + Send + 'static {
        run_search(self.fetcher.clone(), self.records.clone(), request)
    }

    /// Apply a finished search. Returns false when it was superseded.
    pub fn apply_search(&mut self, completion: SearchCompletion) -> bool {
        if completion.id != self.latest_search {
            debug!(id = completion.id, latest = self.latest_search, "discarding superseded search response");
            return false;
        }

        match completion.result {
            Ok(PageOutcome::Records { records, pagination }) => {
                info!(count = records.len(), "search complete");
                self.view.set_records(records);
                self.pagination = pagination;
                self.status = SearchStatus::Ready;
                self.snapshot = None;
            }
            Ok(PageOutcome::NoResults { suggestions }) => {
                info!(suggestions = suggestions.len(), "no results");
                self.suggestions = suggestions;
                self.status = SearchStatus::NoResults;
                self.snapshot = None;
            }
            Ok(PageOutcome::Empty) => {
                self.status = SearchStatus::Empty;
                self.snapshot = None;
            }
            Err(e) => {
                warn!(error = %e, "search failed");
                if let Some(snapshot) = self.snapshot.take() {
                    self.view.set_records(snapshot.records);
                    self.pagination = snapshot.pagination;
                    self.term = snapshot.term;
                    self.page = snapshot.page;
                }
                self.status = SearchStatus::Failed(e.to_string());
            }
        }
        true
    }

    /// Leave the error state, back to whatever results are held
    pub fn acknowledge_failure(&mut self) {
        if matches!(self.status, SearchStatus::Failed(_)) {
            self.status = if self.view.records().is_empty() {
                SearchStatus::Idle
            } else {
                SearchStatus::Ready
            };
        }
    }

    pub fn cycle_sort(&mut self) -> SortKey {
        let next = self.view.sort().next();
        self.view.set_sort(next);
        next
    }

    pub fn cycle_filter(&mut self) -> OwnerFilter {
        let next = self.view.next_filter();
        self.view.set_filter(next.clone());
        next
    }

    #[cfg(test)]
    pub fn set_sort(&mut self, key: SortKey) {
        self.view.set_sort(key);
    }

    #[cfg(test)]
    pub fn set_filter(&mut self, filter: OwnerFilter) {
        self.view.set_filter(filter);
    }

    /// Open the gallery for `record`
    pub fn begin_gallery(&mut self, record: &DrugRecord) -> GalleryRequest {
        self.latest_gallery += 1;
        self.gallery_status = GalleryStatus::Loading {
            title: record.title_local.clone(),
        };
        debug!(id = self.latest_gallery, url = %record.detail_url, "gallery requested");

        GalleryRequest {
            id: self.latest_gallery,
            url: record.detail_url.clone(),
            title: record.title_local.clone(),
        }
    }

    pub fn gallery_task(&self, request: GalleryRequest) -> impl Future<Output = GalleryCompletion> + Send + 'static {
        run_gallery(self.fetcher.clone(), self.gallery.clone(), request)
    }

    /// Apply a finished gallery fetch. Returns false when it was superseded
    /// or the gallery was closed meanwhile.
    pub fn apply_gallery(&mut self, completion: GalleryCompletion) -> bool {
        if completion.id != self.latest_gallery {
            debug!(id = completion.id, "discarding superseded gallery response");
            return false;
        }
        let title = match &self.gallery_status {
            GalleryStatus::Loading { title } => title.clone(),
            _ => return false,
        };

        self.gallery_status = match completion.result {
            Ok(images) => GalleryStatus::Ready { title, images },
            Err(e) => {
                warn!(error = %e, "gallery fetch failed");
                GalleryStatus::Failed {
                    title,
                    message: e.to_string(),
                }
            }
        };
        true
    }

    /// Close the gallery; a pending fetch for it will be discarded
    pub fn close_gallery(&mut self) {
        self.latest_gallery += 1;
        self.gallery_status = GalleryStatus::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FILTER_KEY, MemoryStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Reply = Result<String, FetchError>;

    /// Fetcher whose responses are released by the test, in any order
    #[derive(Default)]
    struct ScriptedFetcher {
        pending: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    }

    impl ScriptedFetcher {
        fn expect(&self, url: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().insert(url.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            let rx = self.pending.lock().unwrap().remove(url);
            match rx {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(FetchError::Request("dropped".into()))),
                None => Err(FetchError::Status(404)),
            }
        }

        async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Status(404))
        }
    }

    fn config() -> Config {
        Config {
            base_url: "https://irc.fda.gov.ir".to_string(),
            search_path: "/nfi/Search".to_string(),
            page_size: 12,
            ..Config::default()
        }
    }

    fn search_url(term: &str, page: u32) -> String {
        query::build_search_url("https://irc.fda.gov.ir", "/nfi/Search", term, page, 12)
    }

    fn result_page(titles: &[(&str, &str)], pages: &[u32]) -> String {
        let rows: String = titles
            .iter()
            .map(|(title, owner)| {
                format!(
                    r#"<div class="RowSearchSty">
                        <div class="titleSearch-Link-RtlAlter"><a href="/nfi/Detail/{title}">{title}</a></div>
                        <div class="searchRow"><div class="col-md-4"><label>صاحب برند</label><span>{owner}</span></div></div>
                    </div>"#
                )
            })
            .collect();
        let links: String = pages
            .iter()
            .map(|p| format!(r#"<li><a href="/nfi/Search?PageNumber={p}">{p}</a></li>"#))
            .collect();
        format!(r#"<html><body>{rows}<ul class="pagination">{links}</ul></body></html>"#)
    }

    fn setup() -> (SearchOrchestrator, Arc<ScriptedFetcher>, Arc<dyn PreferenceStore>) {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryStore::new());
        let orchestrator = SearchOrchestrator::new(config(), fetcher.clone(), prefs.clone());
        (orchestrator, fetcher, prefs)
    }

    fn titles(orchestrator: &SearchOrchestrator) -> Vec<String> {
        orchestrator
            .view()
            .project()
            .into_iter()
            .map(|r| r.title_local)
            .collect()
    }

    #[tokio::test]
    async fn test_search_applies_records() {
        let (mut orch, fetcher, _) = setup();
        let reply = fetcher.expect(&search_url("aspirin", 1));

        let request = orch.submit_query("  aspirin ").unwrap();
        assert_eq!(request.url, search_url("aspirin", 1));
        assert_eq!(orch.status(), &SearchStatus::Loading);

        reply.send(Ok(result_page(&[("آسپرین", "AcmeCo")], &[1, 2]))).unwrap();
        let completion = orch.search_task(request).await;
        assert!(orch.apply_search(completion));

        assert_eq!(orch.status(), &SearchStatus::Ready);
        assert_eq!(titles(&orch), vec!["آسپرین"]);
        assert_eq!(orch.pagination().len(), 2);
        assert_eq!(orch.history().terms(), ["aspirin"]);
    }

    #[tokio::test]
    async fn test_late_response_of_older_search_is_discarded() {
        let (mut orch, fetcher, _) = setup();
        let reply_a = fetcher.expect(&search_url("aspirin", 1));
        let reply_b = fetcher.expect(&search_url("brufen", 1));

        let request_a = orch.submit_query("aspirin").unwrap();
        let task_a = tokio::spawn(orch.search_task(request_a));
        let request_b = orch.submit_query("brufen").unwrap();
        let task_b = tokio::spawn(orch.search_task(request_b));

        // B resolves first
        reply_b.send(Ok(result_page(&[("بروفن", "Zeta")], &[]))).unwrap();
        let done_b = task_b.await.unwrap();
        assert!(orch.apply_search(done_b));

        // A resolves late and must not overwrite B
        reply_a.send(Ok(result_page(&[("آسپرین", "AcmeCo")], &[]))).unwrap();
        let done_a = task_a.await.unwrap();
        assert!(!orch.apply_search(done_a));

        assert_eq!(titles(&orch), vec!["بروفن"]);
        assert_eq!(orch.term(), "brufen");
        assert_eq!(orch.status(), &SearchStatus::Ready);
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded_too() {
        let (mut orch, fetcher, _) = setup();
        let reply_a = fetcher.expect(&search_url("a", 1));
        let reply_b = fetcher.expect(&search_url("b", 1));

        let request_a = orch.submit_query("a").unwrap();
        let task_a = tokio::spawn(orch.search_task(request_a));
        let request_b = orch.submit_query("b").unwrap();
        let task_b = tokio::spawn(orch.search_task(request_b));

        reply_a.send(Err(FetchError::Status(500))).unwrap();
        assert!(!orch.apply_search(task_a.await.unwrap()));
        assert_eq!(orch.status(), &SearchStatus::Loading);

        reply_b.send(Ok(result_page(&[("ب", "X")], &[]))).unwrap();
        assert!(orch.apply_search(task_b.await.unwrap()));
        assert_eq!(orch.status(), &SearchStatus::Ready);
    }

    #[tokio::test]
    async fn test_transport_failure_restores_previous_results() {
        let (mut orch, fetcher, _) = setup();
        let reply = fetcher.expect(&search_url("aspirin", 1));
        let request = orch.submit_query("aspirin").unwrap();
        reply.send(Ok(result_page(&[("آسپرین", "AcmeCo")], &[1, 2]))).unwrap();
        let completion = orch.search_task(request).await;
        orch.apply_search(completion);

        let reply = fetcher.expect(&search_url("aspirin", 2));
        let request = orch.step_page(1).unwrap();
        assert!(orch.view().records().is_empty());
        reply.send(Err(FetchError::Status(502))).unwrap();
        let completion = orch.search_task(request).await;
        assert!(orch.apply_search(completion));

        assert_eq!(orch.status(), &SearchStatus::Failed("server returned status 502".to_string()));
        assert_eq!(titles(&orch), vec!["آسپرین"]);
        assert_eq!(orch.page(), 1);

        orch.acknowledge_failure();
        assert_eq!(orch.status(), &SearchStatus::Ready);
    }

    #[tokio::test]
    async fn test_no_results_and_empty_outcomes() {
        let (mut orch, fetcher, _) = setup();
        let reply = fetcher.expect(&search_url("zzz", 1));
        let request = orch.submit_query("zzz").unwrap();
        reply
            .send(Ok(r#"<div class="titleNotFind"><a href="/nfi/Search?term=zinc">Zinc</a></div>"#.to_string()))
            .unwrap();
        let completion = orch.search_task(request).await;
        orch.apply_search(completion);
        assert_eq!(orch.status(), &SearchStatus::NoResults);
        assert_eq!(orch.suggestions()[0].term, "zinc");

        let reply = fetcher.expect(&search_url("yyy", 1));
        let request = orch.submit_query("yyy").unwrap();
        assert!(orch.suggestions().is_empty());
        reply.send(Ok("<html><body></body></html>".to_string())).unwrap();
        let completion = orch.search_task(request).await;
        orch.apply_search(completion);
        assert_eq!(orch.status(), &SearchStatus::Empty);
    }

    #[test]
    fn test_blank_query_is_rejected() {
        let (mut orch, _, _) = setup();
        assert!(orch.submit_query("   ").is_none());
        assert_eq!(orch.status(), &SearchStatus::Idle);
        assert!(orch.history().terms().is_empty());
    }

    #[test]
    fn test_fresh_query_resets_sort_and_filter_but_paging_keeps_them() {
        let (mut orch, _, prefs) = setup();
        orch.set_sort(SortKey::PriceDesc);
        orch.set_filter(OwnerFilter::parse("AcmeCo"));

        orch.submit_query("aspirin").unwrap();
        assert_eq!(orch.view().sort(), SortKey::None);
        assert_eq!(orch.view().filter(), &OwnerFilter::All);
        assert_eq!(prefs.get(FILTER_KEY).as_deref(), Some("all"));

        orch.set_sort(SortKey::AlphaLatin);
        let request = orch
            .goto_page(&PageTarget {
                page: 3,
                term_override: None,
            })
            .unwrap();
        assert_eq!(request.url, search_url("aspirin", 3));
        assert_eq!(orch.view().sort(), SortKey::AlphaLatin);
    }

    #[test]
    fn test_pagination_term_override_wins() {
        let (mut orch, _, _) = setup();
        orch.submit_query("aspirin").unwrap();
        let request = orch
            .goto_page(&PageTarget {
                page: 2,
                term_override: Some("asp".to_string()),
            })
            .unwrap();
        assert_eq!(request.term, "asp");
        assert_eq!(request.url, search_url("asp", 2));
        assert_eq!(orch.history().terms(), ["aspirin"]);
    }

    #[test]
    fn test_step_page_needs_a_link() {
        let (mut orch, _, _) = setup();
        orch.submit_query("aspirin").unwrap();
        assert!(orch.step_page(1).is_none());
        assert!(orch.step_page(-1).is_none());
    }

    #[tokio::test]
    async fn test_gallery_supersession_and_close() {
        let (mut orch, fetcher, _) = setup();
        let first = DrugRecord {
            title_local: "الف".to_string(),
            detail_url: "https://irc.fda.gov.ir/nfi/Detail/1".to_string(),
            ..Default::default()
        };
        let second = DrugRecord {
            title_local: "ب".to_string(),
            detail_url: "https://irc.fda.gov.ir/nfi/Detail/2".to_string(),
            ..Default::default()
        };
        let page = r#"<a data-lightbox="image-1" href="/Images/1.jpg"><img src="/Thumbs/1.jpg"></a>"#;

        let reply_1 = fetcher.expect(&first.detail_url);
        let reply_2 = fetcher.expect(&second.detail_url);
        let request_1 = orch.begin_gallery(&first);
        let request_2 = orch.begin_gallery(&second);

        reply_1.send(Ok(page.to_string())).unwrap();
        reply_2.send(Ok(page.to_string())).unwrap();
        let done_1 = orch.gallery_task(request_1).await;
        let done_2 = orch.gallery_task(request_2).await;

        assert!(!orch.apply_gallery(done_1));
        assert!(orch.apply_gallery(done_2));
        match orch.gallery_status() {
            GalleryStatus::Ready { title, images } => {
                assert_eq!(title, "ب");
                assert_eq!(images.len(), 1);
                assert_eq!(images[0].full_url, "https://irc.fda.gov.ir/Images/1.jpg");
            }
            other => panic!("unexpected gallery status {other:?}"),
        }

        let reply_3 = fetcher.expect(&first.detail_url);
        let request_3 = orch.begin_gallery(&first);
        orch.close_gallery();
        reply_3.send(Ok(page.to_string())).unwrap();
        let done_3 = orch.gallery_task(request_3).await;
        assert!(!orch.apply_gallery(done_3));
        assert_eq!(orch.gallery_status(), &GalleryStatus::Closed);
    }

    #[tokio::test]
    async fn test_gallery_failure() {
        let (mut orch, _, _) = setup();
        let record = DrugRecord {
            title_local: "الف".to_string(),
            detail_url: "https://irc.fda.gov.ir/nfi/Detail/9".to_string(),
            ..Default::default()
        };
        let request = orch.begin_gallery(&record);
        let completion = orch.gallery_task(request).await;
        assert!(orch.apply_gallery(completion));
        assert!(matches!(orch.gallery_status(), GalleryStatus::Failed { .. }));
    }
}
