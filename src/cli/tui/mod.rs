//! Interactive TUI for scanwatch.
//!
//! Type a domain to start a scan, watch pending scans resolve, open a scan
//! to read its result, and export the list.

mod app;
mod input;
mod ui;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::context::AppContext;
use app::TuiApp;

/// How often the screen picks up changes made by the poll loop.
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// Run the TUI against the scan service configured in `ctx`.
pub async fn run(ctx: AppContext, export_dir: PathBuf) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = TuiApp::new(&ctx, export_dir);
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown().await;

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    app.init().await;

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(REDRAW_INTERVAL)? {
            let event = event::read()?;
            if let Some(action) = input::handle_event(event, app.editing) {
                app.handle_action(action).await;
            }
        }

        if !app.running {
            break;
        }

        app.sync().await;
    }

    Ok(())
}
