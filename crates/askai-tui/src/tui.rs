//! Terminal setup and the event pump feeding the chat loop
//!
//! Two tasks push into one channel: terminal input (keys, mouse wheel,
//! resizes) and a steady tick. The tick animates "Thinking..." and is the
//! moment a finished Gemini reply gets picked up.

use std::io::{self, Stderr};
use std::time::Duration;
use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

const TICK_RATE: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
}

impl AppEvent {
    /// Translate a crossterm event; key releases and focus/paste events are dropped
    fn from_terminal(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
            Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
            Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
            _ => None,
        }
    }
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_terminal_reader(tx.clone());
        spawn_ticks(tx, TICK_RATE);
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

fn spawn_terminal_reader(tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut reader = EventStream::new();
        while let Some(event) = reader.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "terminal input closed");
                    break;
                }
            };
            if let Some(app_event) = AppEvent::from_terminal(event) {
                if tx.send(app_event).is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_ticks(tx: UnboundedSender<AppEvent>, rate: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(rate);
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });
}

/// Raw mode, alternate screen and mouse capture (for wheel scrolling)
pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(io::stderr()))?)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Leave the alternate screen before the panic message prints
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
