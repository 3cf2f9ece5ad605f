//! Interactive dashboard
//!
//! Browse vaults and login metadata without a password. Opening a login
//! asks for its vault's master password, then decrypts it in place.

mod app;
mod ui;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kittypass::Storage;
use ratatui::prelude::*;
use std::io;
use tracing::debug;

use app::{App, Flow};

pub fn run(store: &Storage) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store);
    let result = run_app(&mut terminal, &mut app);
    drop(app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    app.refresh();
    debug!("dashboard loaded {} vaults", app.vaults.len());

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) == Flow::Quit {
                return Ok(());
            }
        }
    }
}
