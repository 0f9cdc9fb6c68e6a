//! `canopy-browse`: the interactive session browser (spec §5). A terminal
//! table over the same reconciled view the CLI's `sessions list` uses,
//! refreshed on a tick, with keybindings that mutate live state (kill,
//! archive, set-status) the way the teacher's `hud-core` TUI drives its
//! daemon client — generalized here to call straight through to
//! `canopy_store`/`canopy_fs` since this spec has no daemon.

pub mod app;
pub mod filters;
mod ui;

use std::io;
use std::time::{Duration, Instant};

use canopy_core::{CanopyError, Result, SessionStatus};
use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use app::App;

const TICK_RATE: Duration = Duration::from_millis(500);

pub fn run() -> Result<()> {
    let mut app = App::new()?;
    app.refresh();
    app.start_background_refresh();

    enable_raw_mode().map_err(|e| CanopyError::io("enable raw mode", e))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| CanopyError::io("enter alternate screen", e))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| CanopyError::io("init terminal", e))?;

    let result = event_loop(&mut terminal, &mut app);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    app.save_filters();

    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal
            .draw(|frame| ui::draw(frame, app))
            .map_err(|e| CanopyError::io("draw frame", e))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).map_err(|e| CanopyError::io("poll input", e))? {
            if let Event::Key(key) = event::read().map_err(|e| CanopyError::io("read input", e))? {
                handle_key(app, key.code);
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.refresh();
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Char('x') => app.kill_selected(),
        KeyCode::Char('a') => app.archive_selected(),
        KeyCode::Char('c') => app.toggle_hide_completed(),
        KeyCode::Char('f') => app.toggle_status_filter(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('u') => app.run_cleanup(),
        KeyCode::Char('1') => app.set_selected_status(SessionStatus::Running),
        KeyCode::Char('2') => app.set_selected_status(SessionStatus::Idle),
        KeyCode::Char('3') => app.set_selected_status(SessionStatus::Completed),
        KeyCode::Char('4') => app.set_selected_status(SessionStatus::Interrupted),
        _ => {}
    }
}
