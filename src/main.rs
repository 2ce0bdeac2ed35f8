mod backend;
mod ui;

use backend::config::{APP_NAME, Config};
use backend::error::{FetchError, ResolveError};
use backend::resolver::{CharacterImage, CharacterResolver};
use backend::rickmorty::{CharacterRecord, EpisodeListFetcher, EpisodePage};
use backend::transport::{HttpTransport, Transport};
use ratatui_image::picker::Picker;
use ui::ui::{App, View, ui};

use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{error::Error, fs, io, sync::Arc};
use tokio::sync::mpsc;

enum BackgroundTask {
    PageLoaded {
        page: u32,
        result: Result<EpisodePage, FetchError>,
    },
    CharacterResolved {
        episode_id: u32,
        reference: String,
        result: Result<CharacterRecord, ResolveError>,
    },
    ImageResolved {
        episode_id: u32,
        image_ref: String,
        result: Result<CharacterImage, ResolveError>,
    },
}

struct Services {
    fetcher: EpisodeListFetcher,
    resolver: CharacterResolver,
    tx: mpsc::UnboundedSender<BackgroundTask>,
}

/// Logs go to a file under the cache dir, and only when RUST_LOG is set,
/// since the terminal belongs to the UI.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }

    let Some(log_dir) = dirs::cache_dir().map(|d| d.join(APP_NAME)) else {
        return;
    };
    if fs::create_dir_all(&log_dir).is_err() {
        return;
    }

    if let Ok(file) = fs::File::create(log_dir.join(format!("{APP_NAME}.log"))) {
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = Config::load();
    log::info!("starting with base url {}", config.base_url);

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
    let fetcher = EpisodeListFetcher::new(transport.clone(), config.base_url.clone());
    let resolver = CharacterResolver::from_config(transport, &config);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let picker = Picker::from_query_stdio().ok();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(picker);

    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let services = Services {
        fetcher,
        resolver,
        tx: task_tx,
    };

    app.set_loading("Fetching episodes...");
    if let Some(page) = app.retry_page() {
        spawn_page_loader(&services, page);
    }

    let res = run_app(&mut terminal, &mut app, &mut task_rx, &services).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

fn spawn_page_loader(services: &Services, page: u32) {
    let fetcher = services.fetcher.clone();
    let tx = services.tx.clone();

    tokio::spawn(async move {
        let result = fetcher.fetch_page(page).await;
        let _ = tx.send(BackgroundTask::PageLoaded { page, result });
    });
}

fn spawn_character_loaders(services: &Services, episode_id: u32, references: Vec<String>) {
    for reference in references {
        let resolver = services.resolver.clone();
        let tx = services.tx.clone();

        tokio::spawn(async move {
            let result = resolver.resolve(&reference).await;
            let _ = tx.send(BackgroundTask::CharacterResolved {
                episode_id,
                reference,
                result,
            });
        });
    }
}

fn spawn_image_loaders(services: &Services, episode_id: u32, image_refs: Vec<String>) {
    for image_ref in image_refs {
        let resolver = services.resolver.clone();
        let tx = services.tx.clone();

        tokio::spawn(async move {
            let result = resolver.resolve_image(&image_ref).await;
            let _ = tx.send(BackgroundTask::ImageResolved {
                episode_id,
                image_ref,
                result,
            });
        });
    }
}

/// Work that depends on what the last draw put on screen.
fn schedule_visible_work(app: &mut App, services: &Services) {
    if let Some(page) = app.next_page_due() {
        spawn_page_loader(services, page);
    }
    if let Some((episode_id, references)) = app.records_to_request() {
        spawn_character_loaders(services, episode_id, references);
    }
    if let Some((episode_id, image_refs)) = app.images_to_request() {
        spawn_image_loaders(services, episode_id, image_refs);
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    services: &Services,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        terminal.draw(|f| ui(f, app))?;
        schedule_visible_work(app, services);

        tokio::select! {
            // Keeps the loading spinner moving
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if key.code == KeyCode::Char('q') {
                        return Ok(());
                    }
                    match app.view {
                        View::EpisodeList => handle_list_input(app, key.code, services),
                        View::EpisodeDetail => handle_detail_input(app, key.code),
                    }
                }
            }

            Some(task) = task_rx.recv() => {
                match task {
                    BackgroundTask::PageLoaded { page, result } => {
                        app.apply_page(page, result);
                    }
                    BackgroundTask::CharacterResolved { episode_id, reference, result } => {
                        app.apply_character(episode_id, &reference, result);
                    }
                    BackgroundTask::ImageResolved { episode_id, image_ref, result } => {
                        app.apply_image(episode_id, &image_ref, result);
                    }
                }
            }
        }
    }
}

fn handle_list_input(app: &mut App, key: KeyCode, services: &Services) {
    match key {
        KeyCode::Down | KeyCode::Char('j') => app.select_next_episode(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_episode(),
        KeyCode::Enter => {
            if let Some((episode_id, references)) = app.open_selected_episode() {
                spawn_character_loaders(services, episode_id, references);
            }
        }
        KeyCode::Char('r') => {
            if let Some(page) = app.retry_page() {
                spawn_page_loader(services, page);
            }
        }
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_character(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_character(),
        KeyCode::Char('o') => {
            if let Some(detail) = &app.detail {
                if let Err(e) = webbrowser::open(&detail.episode.source_url) {
                    log::warn!("could not open {}: {e}", detail.episode.source_url);
                    app.status = Some(format!("Could not open browser: {e}"));
                }
            }
        }
        _ => {}
    }
}
