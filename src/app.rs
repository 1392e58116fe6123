//! Application state and core logic

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{info, warn};

use crate::asset_cache::{AssetCache, AssetSource, CachedAsset};
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::orchestrator::{
    GalleryCompletion, GalleryRequest, GalleryStatus, SearchCompletion, SearchOrchestrator,
    SearchRequest, SearchStatus,
};
use crate::records::DrugRecord;
use crate::storage::{PreferenceStore, THEME_KEY};

/// Messages sent from background tasks to the main app
#[derive(Debug)]
pub enum AppMessage {
    SearchComplete(SearchCompletion),
    GalleryComplete(GalleryCompletion),
    /// A gallery image finished downloading (or failed)
    AssetReady(Result<CachedAsset, String>),
}

/// Which part of the screen has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// User is typing a search query
    Input,
    /// Browsing results, suggestions or an empty page
    Results,
    /// Image gallery of one record
    Gallery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn load(prefs: &dyn PreferenceStore) -> Self {
        match prefs.get(THEME_KEY).as_deref() {
            Some("light") => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn as_stored(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Main application structure
pub struct App {
    pub state: AppState,
    pub input: String,
    pub orchestrator: SearchOrchestrator,
    pub assets: AssetCache,
    pub fetcher: Arc<dyn Fetcher>,
    pub theme: Theme,
    pub selected_index: usize,
    pub suggestion_index: usize,
    pub gallery_index: usize,
    /// Position while recalling history with Up/Down
    history_cursor: Option<usize>,
    /// Status message shown in UI
    pub status_message: String,
    prefs: Arc<dyn PreferenceStore>,
}

impl App {
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>, prefs: Arc<dyn PreferenceStore>) -> Result<Self> {
        let network_only = vec![format!("{}{}", config.base_url, config.search_path)];
        let assets = AssetCache::new(config.assets_dir(), network_only, config.cache_max_age_days)?;

        // Background cleanup of expired cached images
        let cleanup = assets.clone();
        tokio::spawn(async move {
            if let Err(e) = cleanup.cleanup_old_files().await {
                warn!(error = %e, "asset cache cleanup failed");
            }
        });

        Ok(Self {
            state: AppState::Input,
            input: String::new(),
            theme: Theme::load(prefs.as_ref()),
            orchestrator: SearchOrchestrator::new(config, fetcher.clone(), prefs.clone()),
            assets,
            fetcher,
            selected_index: 0,
            suggestion_index: 0,
            gallery_index: 0,
            history_cursor: None,
            status_message: String::new(),
            prefs,
        })
    }

    /// Submit the input field as a fresh query
    pub fn submit(&mut self) -> Option<SearchRequest> {
        let request = self.orchestrator.submit_query(&self.input)?;
        self.input = request.term.clone();
        self.start(request)
    }

    /// Run the selected "did you mean" suggestion as a fresh query
    pub fn run_suggestion(&mut self) -> Option<SearchRequest> {
        let term = self
            .orchestrator
            .suggestions()
            .get(self.suggestion_index)?
            .term
            .clone();
        self.input = term;
        self.submit()
    }

    pub fn next_page(&mut self) -> Option<SearchRequest> {
        let request = self.orchestrator.step_page(1)?;
        self.start(request)
    }

    pub fn previous_page(&mut self) -> Option<SearchRequest> {
        let request = self.orchestrator.step_page(-1)?;
        self.start(request)
    }

    fn start(&mut self, request: SearchRequest) -> Option<SearchRequest> {
        self.state = AppState::Results;
        self.selected_index = 0;
        self.suggestion_index = 0;
        self.history_cursor = None;
        self.status_message = format!("Searching \"{}\" (page {})...", request.term, request.page);
        Some(request)
    }

    pub fn finish_search(&mut self, completion: SearchCompletion) {
        if !self.orchestrator.apply_search(completion) {
            return;
        }

        self.selected_index = 0;
        self.suggestion_index = 0;
        self.status_message = match self.orchestrator.status() {
            SearchStatus::Ready => format!(
                "{} results on page {}",
                self.orchestrator.view().records().len(),
                self.orchestrator.page()
            ),
            SearchStatus::NoResults => "No results".to_string(),
            SearchStatus::Empty => "Nothing found".to_string(),
            SearchStatus::Failed(_) => String::new(),
            SearchStatus::Idle | SearchStatus::Loading => self.status_message.clone(),
        };
    }

    /// Whether the error view is showing
    pub fn has_error(&self) -> bool {
        matches!(self.orchestrator.status(), SearchStatus::Failed(_))
    }

    /// Dismiss error; the restored results are shown again
    pub fn dismiss_error(&mut self) {
        self.orchestrator.acknowledge_failure();
        self.state = if self.orchestrator.view().records().is_empty() {
            AppState::Input
        } else {
            AppState::Results
        };
        self.clamp_selection();
    }

    /// Records as currently filtered and sorted
    pub fn visible_records(&self) -> Vec<DrugRecord> {
        self.orchestrator.view().project()
    }

    pub fn selected_record(&self) -> Option<DrugRecord> {
        self.visible_records().into_iter().nth(self.selected_index)
    }

    /// Move to next result (or suggestion)
    pub fn next_result(&mut self) {
        match self.orchestrator.status() {
            SearchStatus::NoResults => {
                let count = self.orchestrator.suggestions().len();
                if count > 0 {
                    self.suggestion_index = (self.suggestion_index + 1) % count;
                }
            }
            _ => {
                let count = self.visible_records().len();
                if count > 0 {
                    self.selected_index = (self.selected_index + 1) % count;
                }
            }
        }
    }

    /// Move to previous result (or suggestion)
    pub fn previous_result(&mut self) {
        match self.orchestrator.status() {
            SearchStatus::NoResults => {
                let count = self.orchestrator.suggestions().len();
                if count > 0 {
                    self.suggestion_index = (self.suggestion_index + count - 1) % count;
                }
            }
            _ => {
                let count = self.visible_records().len();
                if count > 0 {
                    self.selected_index = (self.selected_index + count - 1) % count;
                }
            }
        }
    }

    /// Get scroll offset for rendering, `item_height` rows per record
    pub fn get_scroll_offset(&self, visible_height: usize, item_height: usize) -> usize {
        let items_per_screen = (visible_height / item_height.max(1)).max(1);

        if self.selected_index >= items_per_screen {
            self.selected_index + 1 - items_per_screen
        } else {
            0
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.visible_records().len();
        if self.selected_index >= count {
            self.selected_index = count.saturating_sub(1);
        }
    }

    pub fn cycle_sort(&mut self) {
        let key = self.orchestrator.cycle_sort();
        self.selected_index = 0;
        self.status_message = format!("Sort: {}", key);
    }

    pub fn cycle_filter(&mut self) {
        let filter = self.orchestrator.cycle_filter();
        self.selected_index = 0;
        self.status_message = format!("Owner: {}", filter.as_stored());
    }

    /// Recall an older history term into the input field
    pub fn history_older(&mut self) {
        let terms = self.orchestrator.history().terms();
        if terms.is_empty() {
            return;
        }
        let next = match self.history_cursor {
            None => 0,
            Some(i) => (i + 1).min(terms.len() - 1),
        };
        self.input = terms[next].clone();
        self.history_cursor = Some(next);
    }

    /// Recall a newer history term; past the newest the field is cleared
    pub fn history_newer(&mut self) {
        match self.history_cursor {
            None => {}
            Some(0) => {
                self.history_cursor = None;
                self.input.clear();
            }
            Some(i) => {
                self.input = self.orchestrator.history().terms()[i - 1].clone();
                self.history_cursor = Some(i - 1);
            }
        }
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.history_cursor = None;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.prefs.set(THEME_KEY, self.theme.as_stored());
    }

    /// Open the gallery of the selected record
    pub fn open_gallery(&mut self) -> Option<GalleryRequest> {
        let record = self.selected_record()?;
        if record.detail_url.is_empty() || record.detail_url.starts_with('#') {
            self.status_message = "No detail page for this record".to_string();
            return None;
        }

        self.state = AppState::Gallery;
        self.gallery_index = 0;
        Some(self.orchestrator.begin_gallery(&record))
    }

    pub fn finish_gallery(&mut self, completion: GalleryCompletion) {
        if self.orchestrator.apply_gallery(completion) {
            self.gallery_index = 0;
        }
    }

    pub fn close_gallery(&mut self) {
        self.orchestrator.close_gallery();
        self.state = AppState::Results;
    }

    fn gallery_len(&self) -> usize {
        match self.orchestrator.gallery_status() {
            GalleryStatus::Ready { images, .. } => images.len(),
            _ => 0,
        }
    }

    /// Next image, wrapping to the first
    pub fn next_image(&mut self) {
        let count = self.gallery_len();
        if count > 0 {
            self.gallery_index = (self.gallery_index + 1) % count;
        }
    }

    /// Previous image, wrapping to the last
    pub fn previous_image(&mut self) {
        let count = self.gallery_len();
        if count > 0 {
            self.gallery_index = (self.gallery_index + count - 1) % count;
        }
    }

    /// Full-size URL of the selected image, if it can be cached
    pub fn selected_image_url(&mut self) -> Option<String> {
        let url = match self.orchestrator.gallery_status() {
            GalleryStatus::Ready { images, .. } => images.get(self.gallery_index)?.full_url.clone(),
            _ => return None,
        };

        if !self.assets.is_cacheable(&url) {
            self.status_message = "Image is not a downloadable file".to_string();
            return None;
        }
        self.status_message = "Downloading image...".to_string();
        Some(url)
    }

    pub fn finish_asset(&mut self, result: Result<CachedAsset, String>) {
        match result {
            Ok(asset) => {
                let origin = match asset.source {
                    AssetSource::Cache => "cached",
                    AssetSource::Network => "downloaded",
                };
                match open_path(&asset.path) {
                    Ok(()) => self.status_message = format!("Opened {} image", origin),
                    Err(e) => self.status_message = format!("Failed to open image: {}", e),
                }
            }
            Err(e) => self.status_message = format!("Image failed: {}", e),
        }
    }

    /// Open the selected record's detail page in the browser
    pub fn open_in_browser(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        if record.detail_url.is_empty() {
            return;
        }
        match open_url(&record.detail_url) {
            Ok(()) => self.status_message = "Opened detail page in browser".to_string(),
            Err(e) => self.status_message = format!("Failed to open URL: {}", e),
        }
    }

    /// Show the selected record's product code in the status line
    pub fn show_product_code(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        self.status_message = match record.product_code {
            Some(code) => format!("Product code: {}", code),
            None => "No product code".to_string(),
        };
    }

    /// Go back to input mode
    pub fn back_to_input(&mut self) {
        self.state = AppState::Input;
    }
}

fn open_path(path: &Path) -> Result<()> {
    info!(path = %path.display(), "opening file");
    open_url(&path.to_string_lossy())
}

/// Open URL (or local file) with the system handler
fn open_url(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = Command::new("xdg-open");

    command
        .arg(url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to launch system opener")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::records::PageOutcome;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct OfflineFetcher;

    #[async_trait]
    impl Fetcher for OfflineFetcher {
        async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
            Err(FetchError::Request("offline".into()))
        }

        async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Request("offline".into()))
        }
    }

    fn app(dir: &Path, prefs: Arc<dyn PreferenceStore>) -> App {
        let config = Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        };
        App::new(config, Arc::new(OfflineFetcher), prefs).unwrap()
    }

    fn record(title: &str, owner: &str) -> DrugRecord {
        DrugRecord {
            title_local: title.to_string(),
            owner_name: Some(owner.to_string()),
            detail_url: format!("https://irc.fda.gov.ir/nfi/Detail/{title}"),
            ..Default::default()
        }
    }

    fn deliver(app: &mut App, request: SearchRequest, records: Vec<DrugRecord>) {
        app.finish_search(SearchCompletion {
            id: request.id,
            result: Ok(PageOutcome::Records {
                records,
                pagination: Vec::new(),
            }),
        });
    }

    #[tokio::test]
    async fn test_theme_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryStore::new());
        let mut app = app(dir.path(), prefs.clone());
        assert_eq!(app.theme, Theme::Dark);

        app.toggle_theme();
        assert_eq!(prefs.get(THEME_KEY).as_deref(), Some("light"));
        assert_eq!(Theme::load(prefs.as_ref()), Theme::Light);
    }

    #[tokio::test]
    async fn test_history_recall() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), Arc::new(MemoryStore::new()));
        for term in ["aspirin", "brufen"] {
            app.input = term.to_string();
            app.submit().unwrap();
        }
        app.clear_input();

        app.history_older();
        assert_eq!(app.input, "brufen");
        app.history_older();
        app.history_older();
        assert_eq!(app.input, "aspirin");
        app.history_newer();
        assert_eq!(app.input, "brufen");
        app.history_newer();
        assert_eq!(app.input, "");
    }

    #[tokio::test]
    async fn test_navigation_wraps_and_error_restores_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), Arc::new(MemoryStore::new()));
        app.input = "aspirin".to_string();
        let request = app.submit().unwrap();
        deliver(&mut app, request, vec![record("الف", "A"), record("ب", "B")]);

        app.previous_result();
        assert_eq!(app.selected_index, 1);
        app.next_result();
        assert_eq!(app.selected_index, 0);

        app.input = "brufen".to_string();
        let request = app.submit().unwrap();
        app.finish_search(SearchCompletion {
            id: request.id,
            result: Err(FetchError::Status(500)),
        });
        assert!(app.has_error());

        app.dismiss_error();
        assert!(!app.has_error());
        assert_eq!(app.state, AppState::Results);
        assert_eq!(app.visible_records().len(), 2);
    }

    #[tokio::test]
    async fn test_gallery_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), Arc::new(MemoryStore::new()));
        app.input = "aspirin".to_string();
        let request = app.submit().unwrap();
        deliver(&mut app, request, vec![record("الف", "A")]);

        let request = app.open_gallery().unwrap();
        assert_eq!(app.state, AppState::Gallery);
        let images = (1..=3)
            .map(|i| crate::gallery::GalleryImage {
                full_url: format!("https://irc.fda.gov.ir/Images/{i}.jpg"),
                thumb_url: format!("https://irc.fda.gov.ir/Thumbs/{i}.jpg"),
            })
            .collect();
        app.finish_gallery(GalleryCompletion {
            id: request.id,
            result: Ok(images),
        });

        app.previous_image();
        assert_eq!(app.gallery_index, 2);
        app.next_image();
        assert_eq!(app.gallery_index, 0);
        assert_eq!(
            app.selected_image_url().as_deref(),
            Some("https://irc.fda.gov.ir/Images/1.jpg")
        );

        app.close_gallery();
        assert_eq!(app.state, AppState::Results);
    }

    #[tokio::test]
    async fn test_product_code_in_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), Arc::new(MemoryStore::new()));
        app.input = "aspirin".to_string();
        let request = app.submit().unwrap();
        let mut with_code = record("الف", "A");
        with_code.product_code = Some("1234567890".to_string());
        deliver(&mut app, request, vec![with_code]);

        app.show_product_code();
        assert_eq!(app.status_message, "Product code: 1234567890");
    }
}
