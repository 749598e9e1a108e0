//! SLUICE board terminal entry point.

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use sluice_board::{AllowAll, Board, PendingCommit};
use sluice_core::RawDocument;
use sluice_storage::{InMemoryRecordStore, RecordStore, RemoteRecordStore};
use sluice_tui::config::{StoreConfig, TuiConfig};
use sluice_tui::error::TuiError;
use sluice_tui::events::TuiEvent;
use sluice_tui::keys::map_key;
use sluice_tui::state::{App, Control};
use sluice_tui::views::render_view;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), TuiError> {
    let config = TuiConfig::load()?;
    sluice_tui::logging::init(&config.log_path)?;

    let store = build_store(&config)?;
    let mut board = Board::connect(&config.board_config(), store, Arc::new(AllowAll)).await?;
    tracing::info!(collection = %config.collection, "Board connected");

    let (event_tx, mut event_rx) = mpsc::channel::<TuiEvent>(256);
    spawn_board_watchers(&mut board, event_tx.clone());
    let mut app = App::new(config, board);

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard {};
    spawn_input_reader(event_tx.clone());

    let tick_rate = Duration::from_millis(app.config.refresh_interval_ms);
    let mut ticker = tokio::time::interval(tick_rate);

    loop {
        terminal.draw(|f| {
            app.sync_frame(f.size());
            render_view(f, &app);
        })?;

        tokio::select! {
            _ = ticker.tick() => {}
            Some(event) = event_rx.recv() => {
                if handle_event(&mut app, event, &event_tx) == Control::Quit {
                    break;
                }
            }
        }
    }

    app.board.shutdown().await;
    tracing::info!("Board closed");
    Ok(())
}

fn build_store(config: &TuiConfig) -> Result<Arc<dyn RecordStore>, TuiError> {
    match &config.store {
        StoreConfig::Remote(remote) => Ok(Arc::new(RemoteRecordStore::new(remote)?)),
        StoreConfig::Memory(memory) => {
            let contents = std::fs::read_to_string(&memory.seed_path)?;
            let documents: Vec<RawDocument> = serde_json::from_str(&contents)?;
            let store = InMemoryRecordStore::new();
            store.seed(&config.collection, documents)?;
            Ok(Arc::new(store))
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableMouseCapture, LeaveAlternateScreen);
    }
}

fn spawn_input_reader(sender: mpsc::Sender<TuiEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(200)) {
            if let Ok(evt) = event::read() {
                let forwarded = match evt {
                    CrosstermEvent::Key(key) => Some(TuiEvent::Input(key)),
                    CrosstermEvent::Mouse(mouse) => Some(TuiEvent::Mouse(mouse)),
                    CrosstermEvent::Resize(width, height) => Some(TuiEvent::Resize { width, height }),
                    _ => None,
                };
                if let Some(event) = forwarded {
                    if sender.blocking_send(event).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Forward confirmed-board changes and soft notices into the event loop.
fn spawn_board_watchers(board: &mut Board, sender: mpsc::Sender<TuiEvent>) {
    let mut snapshots = board.snapshots();
    let changes = sender.clone();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            if changes.send(TuiEvent::BoardChanged).await.is_err() {
                break;
            }
        }
    });

    if let Some(mut notices) = board.take_notices() {
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                if sender.send(TuiEvent::Notice(notice)).await.is_err() {
                    break;
                }
            }
        });
    }
}

fn handle_event(app: &mut App, event: TuiEvent, sender: &mpsc::Sender<TuiEvent>) -> Control {
    match event {
        TuiEvent::Input(key) => {
            if let Some(action) = map_key(key) {
                let (control, pending) = app.handle_action(action);
                if let Some(pending) = pending {
                    run_commit(pending, sender.clone());
                }
                return control;
            }
        }
        TuiEvent::Mouse(mouse) => {
            if let Some(pending) = app.handle_mouse(mouse) {
                run_commit(pending, sender.clone());
            }
        }
        TuiEvent::Committed(outcome) => app.finish_commit(outcome),
        TuiEvent::Notice(notice) => app.handle_notice(notice),
        TuiEvent::BoardChanged | TuiEvent::Resize { .. } => {}
    }
    Control::Continue
}

/// Run a batch off the UI loop and hand the outcome back as an event.
fn run_commit(pending: PendingCommit, sender: mpsc::Sender<TuiEvent>) {
    tokio::spawn(async move {
        let outcome = pending.run().await;
        let _ = sender.send(TuiEvent::Committed(outcome)).await;
    });
}
