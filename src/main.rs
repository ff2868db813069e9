use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use winery_map::app::{App, InputMode};
use winery_map::auth::{AppContext, StaticAuthProvider};
use winery_map::catalog::Catalog;
use winery_map::config::Config;
use winery_map::location::FixedLocation;
use winery_map::session::{MapSession, SessionSettings};
use winery_map::status::{JsonStatusStore, MemoryStatusStore, StatusBackend};
use winery_map::{logging, map, ui};

fn main() -> Result<()> {
    let config = Config::load().context("reading configuration")?;
    logging::init(&config.log_path)?;
    info!(?config, "starting");
    if !config.defaulted.is_empty() {
        info!(keys = ?config.defaulted, "unset keys use their defaults");
    }

    let mut app = build_app(&config)?;

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &mut app);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    app.unmount();

    if let Err(e) = &result {
        error!("exiting on error: {e:#}");
    }
    result
}

fn build_app(config: &Config) -> Result<App> {
    let catalog = Catalog::load(config.catalog_path.as_deref()).context("loading winery catalog")?;

    let backend: Arc<dyn StatusBackend> = match &config.status_path {
        Some(path) => Arc::new(JsonStatusStore::new(path.clone())),
        None => Arc::new(MemoryStatusStore::new()),
    };

    let mut context = AppContext::new(Box::new(StaticAuthProvider::new(config.user_id.clone())));
    let user = context.start().cloned();

    let settings = SessionSettings {
        cluster: config.cluster,
        leaf_limit: config.leaf_limit,
        status_timeout: config.status_timeout,
    };
    let session = MapSession::new(catalog, backend, user, settings);

    let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
    let mut app = App::new(
        width as usize,
        height as usize,
        session,
        context,
        Arc::new(FixedLocation::new(config.home)),
    );
    map::load_or_fallback(&mut app.map_renderer, &config.basemap_path);
    Ok(app)
}

/// Handle mouse events for panning, zooming and tapping
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.begin_drag(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(mouse.column, mouse.row),
        _ => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if let InputMode::Search(_) = app.mode {
        match key.code {
            KeyCode::Enter => app.commit_search(),
            KeyCode::Esc => app.cancel_search(),
            KeyCode::Backspace => app.search_backspace(),
            KeyCode::Char(ch) => app.search_input(ch),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

        KeyCode::Tab => app.select_next(),
        KeyCode::Enter => app.expand_nearest(),
        KeyCode::Char('f') => app.toggle_favorite(),
        KeyCode::Char('w') => app.toggle_wishlist(),
        KeyCode::Char('v') => app.record_visit(),
        KeyCode::Char('F') => app.cycle_filter(),
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Char('m') => app.locate(),
        KeyCode::Char('L') => app.map_renderer.toggle_labels(),
        KeyCode::Char('B') => app.map_renderer.toggle_basemap(),
        KeyCode::Char('r') | KeyCode::Char('0') => app.reset(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    let size = terminal.size()?;
    app.resize(size.width as usize, size.height as usize);
    app.mount();

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        // ~60fps; status deliveries are picked up between events
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
