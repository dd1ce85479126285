mod app;
mod handler;
mod tui;
mod ui;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use finadvisor_core::{Config, ScratchStorage, SummaryStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use tui::EventHandler;

/// `{data_local_dir}/finadvisor/finadvisor.log`
fn log_path() -> Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("finadvisor");
    fs::create_dir_all(&dir)?;
    Ok(dir.join("finadvisor.log"))
}

// Append so earlier sessions' warnings survive a restart
fn open_log(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// Log to a file; the terminal belongs to the UI
fn init_logging() -> Result<()> {
    let file = open_log(&log_path()?)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finadvisor_core=info,finadvisor=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn summary_store() -> SummaryStore {
    match ScratchStorage::default_path() {
        Ok(path) => SummaryStore::new(ScratchStorage::new(path)),
        Err(e) => {
            warn!("Summary will not survive a restart: {}", e);
            SummaryStore::in_memory()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is optional; say so before the UI takes the terminal
    if let Err(e) = init_logging() {
        eprintln!("finadvisor: logging disabled: {}", e);
    }

    let config = Config::load_or_create().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::new()
    });
    info!(
        "Starting finadvisor v{} with {} against {}",
        env!("CARGO_PKG_VERSION"),
        config.provider().display_name(),
        config.backend_url()
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(&config, summary_store(), events.sender());

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    info!("Shutting down");
    Ok(())
}
