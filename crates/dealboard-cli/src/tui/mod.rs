mod app;
mod canvas;
mod ui;

use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;

use dealboard_core::board::Board;
use dealboard_core::contracts::RecordStore;
use dealboard_store::JsonFilterPrefs;

use crate::session::Session;
use app::App;

/// Frame interval while something on screen is moving.
const FRAME: Duration = Duration::from_millis(16);
/// Poll interval when the board is at rest.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Open the interactive board for the repo at `repo_root`.
pub fn run(repo_root: &Path) -> anyhow::Result<()> {
    let session = Session::open(repo_root)?;
    let prefs = JsonFilterPrefs::for_project(repo_root);
    let board = Board::new(session.store, Box::new(prefs), session.config);
    let mut app = App::new(board);
    tracing::info!(root = %repo_root.display(), "board opened");

    let mut terminal = ratatui::init();
    bracket(
        || execute!(std::io::stdout(), EnableMouseCapture),
        || event_loop(&mut terminal, &mut app),
        || {
            let _ = execute!(std::io::stdout(), DisableMouseCapture);
            ratatui::restore();
        },
    )
}

/// Run `body` after `enter` succeeds. `leave` runs in every case, so a
/// failed setup still hands the terminal back.
fn bracket<T>(
    enter: impl FnOnce() -> std::io::Result<()>,
    body: impl FnOnce() -> anyhow::Result<T>,
    leave: impl FnOnce(),
) -> anyhow::Result<T> {
    let result = match enter() {
        Ok(()) => body(),
        Err(e) => Err(anyhow::Error::new(e).context("could not enable mouse capture")),
    };
    leave();
    result
}

fn event_loop<S: RecordStore>(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App<S>,
) -> anyhow::Result<()> {
    loop {
        let now = Instant::now();
        let mut board_top = 0;
        terminal.draw(|f| {
            board_top = ui::areas(f.area()).0.y;
            ui::draw(f, app, now);
        })?;
        app.board.frame_painted(&mut app.canvas);
        app.canvas.step();

        if event::poll(poll_timeout(app, Instant::now()))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse, board_top),
                Event::Resize(_, _) => app.board.viewport_resized(),
                _ => {}
            }
        }

        app.tick(Instant::now());
        if app.should_quit {
            break;
        }
    }
    tracing::info!("board closed");
    Ok(())
}

/// Sleep until the next timer, or one frame while animating.
fn poll_timeout<S: RecordStore>(app: &App<S>, now: Instant) -> Duration {
    let mut timeout = if app.is_animating(now) { FRAME } else { IDLE_POLL };
    if let Some(deadline) = app.board.next_deadline() {
        timeout = timeout.min(deadline.saturating_duration_since(now));
    }
    timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn bracket_restores_after_failed_setup() {
        let restored = Cell::new(false);
        let ran = Cell::new(false);
        let result: anyhow::Result<()> = bracket(
            || Err(std::io::Error::other("no tty")),
            || {
                ran.set(true);
                Ok(())
            },
            || restored.set(true),
        );
        assert!(result.is_err());
        assert!(!ran.get());
        assert!(restored.get());
    }

    #[test]
    fn bracket_restores_after_body_error() {
        let restored = Cell::new(false);
        let result: anyhow::Result<u8> = bracket(
            || Ok(()),
            || Err(anyhow::anyhow!("draw failed")),
            || restored.set(true),
        );
        assert_eq!(result.unwrap_err().to_string(), "draw failed");
        assert!(restored.get());
    }
}
