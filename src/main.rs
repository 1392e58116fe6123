mod app;
mod asset_cache;
mod collation;
mod config;
mod fetch;
mod gallery;
mod globals;
mod logging;
mod markup;
mod orchestrator;
mod query;
mod records;
mod storage;
mod ui;
mod view_state;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dotenvy::dotenv;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use app::{App, AppMessage, AppState};
use config::Config;
use fetch::{Fetcher, HttpFetcher};
use orchestrator::{GalleryRequest, SearchRequest, SearchStatus};
use storage::{JsonFileStore, PreferenceStore};
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    logging::init_logging(&config.log_path())?;
    info!(base_url = %config.base_url, data_dir = %config.data_dir.display(), "starting");

    let prefs: Arc<dyn PreferenceStore> = Arc::new(JsonFileStore::open(config.preferences_path())?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher);

    // Create app state before touching the terminal so setup errors print normally
    let mut app = App::new(config, fetcher, prefs)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channel for background tasks
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Run the app
    let res = run_app(&mut terminal, &mut app, tx, &mut rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "exited with error");
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn spawn_search(app: &App, tx: &mpsc::UnboundedSender<AppMessage>, request: Option<SearchRequest>) {
    let Some(request) = request else {
        return;
    };
    let task = app.orchestrator.search_task(request);
    let tx = tx.clone();
    tokio::spawn(async move {
        let _ = tx.send(AppMessage::SearchComplete(task.await));
    });
}

fn spawn_gallery(app: &App, tx: &mpsc::UnboundedSender<AppMessage>, request: Option<GalleryRequest>) {
    let Some(request) = request else {
        return;
    };
    let task = app.orchestrator.gallery_task(request);
    let tx = tx.clone();
    tokio::spawn(async move {
        let _ = tx.send(AppMessage::GalleryComplete(task.await));
    });
}

fn spawn_asset(app: &mut App, tx: &mpsc::UnboundedSender<AppMessage>) {
    let Some(url) = app.selected_image_url() else {
        return;
    };
    let assets = app.assets.clone();
    let fetcher = app.fetcher.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = assets
            .fetch(fetcher.as_ref(), &url)
            .await
            .map_err(|e| format!("{:#}", e));
        let _ = tx.send(AppMessage::AssetReady(result));
    });
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tx: mpsc::UnboundedSender<AppMessage>,
    rx: &mut mpsc::UnboundedReceiver<AppMessage>,
) -> Result<()> {
    loop {
        // Check for messages from background tasks (non-blocking)
        while let Ok(msg) = rx.try_recv() {
            match msg {
                AppMessage::SearchComplete(completion) => app.finish_search(completion),
                AppMessage::GalleryComplete(completion) => app.finish_gallery(completion),
                AppMessage::AssetReady(result) => app.finish_asset(result),
            }
        }

        // Draw UI
        terminal.draw(|f| draw_ui(f, app))?;

        // Handle input with timeout - only read ONE event per loop iteration
        if !event::poll(std::time::Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        // Only handle key press events, ignore release and repeat
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('q') {
            return Ok(());
        }

        // Any key dismisses the error
        if app.has_error() {
            app.dismiss_error();
            continue;
        }

        match app.state {
            AppState::Input => match key.code {
                KeyCode::Char('t') if ctrl => app.toggle_theme(),
                KeyCode::Char(c) if !ctrl => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Up => app.history_older(),
                KeyCode::Down => app.history_newer(),
                KeyCode::Enter => {
                    let request = app.submit();
                    spawn_search(app, &tx, request);
                }
                KeyCode::Esc => app.clear_input(),
                KeyCode::Tab if !app.orchestrator.term().is_empty() => app.state = AppState::Results,
                _ => {}
            },
            AppState::Results => {
                let no_results = *app.orchestrator.status() == SearchStatus::NoResults;
                match key.code {
                    KeyCode::Char('j') | KeyCode::Down => app.next_result(),
                    KeyCode::Char('k') | KeyCode::Up => app.previous_result(),
                    KeyCode::Enter if no_results => {
                        let request = app.run_suggestion();
                        spawn_search(app, &tx, request);
                    }
                    KeyCode::Char('b') if ctrl => app.open_in_browser(),
                    KeyCode::Char('t') if ctrl => app.toggle_theme(),
                    KeyCode::Char('s') => app.cycle_sort(),
                    KeyCode::Char('f') => app.cycle_filter(),
                    KeyCode::Char('n') | KeyCode::Right => {
                        let request = app.next_page();
                        spawn_search(app, &tx, request);
                    }
                    KeyCode::Char('p') | KeyCode::Left => {
                        let request = app.previous_page();
                        spawn_search(app, &tx, request);
                    }
                    KeyCode::Char('g') | KeyCode::Enter => {
                        let request = app.open_gallery();
                        spawn_gallery(app, &tx, request);
                    }
                    KeyCode::Char('y') => app.show_product_code(),
                    KeyCode::Esc => app.back_to_input(),
                    _ => {}
                }
            }
            AppState::Gallery => match key.code {
                KeyCode::Char('j') | KeyCode::Down | KeyCode::Right => app.next_image(),
                KeyCode::Char('k') | KeyCode::Up | KeyCode::Left => app.previous_image(),
                KeyCode::Enter => spawn_asset(app, &tx),
                KeyCode::Esc => app.close_gallery(),
                _ => {}
            },
        }
    }
}
