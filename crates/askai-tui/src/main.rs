use anyhow::Result;

mod app;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::App;
use askai_core::Config;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    match logging::configure_logging() {
        Ok(path) => tracing::info!(path = %path.display(), version = env!("CARGO_PKG_VERSION"), "starting askai"),
        Err(e) => eprintln!("Logging disabled: {}", e),
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    let mut app = App::new(config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        tracing::error!(error = %e, "exited with error");
    }
    tracing::info!("stopped");
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        app.observe_store();
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
