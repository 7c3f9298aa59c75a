use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use study_helper::app::App;
use study_helper::config::Config;
use study_helper::{handler, tui, ui};

/// Log to a file: the terminal belongs to the UI
fn init_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("study-helper.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("could not open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("logging disabled: {:#}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        warn!("could not read config, using defaults: {:#}", e);
        Config::default()
    });

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(&config, events.sender());
    info!(key_source = ?app.key_source, "study helper started");

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if app.is_loading() {
        info!("quit with a request still outstanding; abandoning it");
    }
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
