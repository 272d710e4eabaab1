use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{Event as TermEvent, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::prelude::*;
use slidesmith_core::session::Session;
use slidesmith_protocol::{Event, Op};

use crate::app::{Action, App, Status};
use crate::audio::Player;
use crate::clipboard::CopyToClipboard;
use crate::preview;

/// How often playback is checked for a finished clip.
const PLAYBACK_POLL: Duration = Duration::from_millis(200);

/// Drive `session` from the terminal until the user quits.
pub async fn run_viewer(session: Session, out_dir: PathBuf) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &session, App::new(out_dir)).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop<B: Backend + io::Write>(
    terminal: &mut Terminal<B>,
    session: &Session,
    mut app: App,
) -> Result<()> {
    let mut keys = EventStream::new();
    let mut player = Player::new();
    let mut poll = tokio::time::interval(PLAYBACK_POLL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    while app.running {
        terminal.draw(|f| preview::draw(f, &app))?;

        let action = tokio::select! {
            ev = session.next_event() => match ev {
                Some(ev) => {
                    if let Event::NarrationState { state, audio, .. } = &ev {
                        player.sync(*state, audio.as_deref());
                    }
                    app.handle_event(ev)
                }
                None => break,
            },
            _ = poll.tick() => player
                .take_finished()
                .then_some(Action::Submit(Op::NarrationEnded)),
            term = keys.next() => match term {
                Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Some(Ok(_)) => None,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        };

        match action {
            Some(Action::Submit(op)) => {
                session.submit(op).await?;
            }
            Some(Action::Copy(text)) => {
                if let Err(e) = execute!(terminal.backend_mut(), CopyToClipboard(&text)) {
                    tracing::warn!("clipboard copy failed: {e}");
                    app.set_status(Status::Error(format!("Copy failed: {e}")));
                }
            }
            Some(Action::Quit) => {
                session.submit(Op::Shutdown).await?;
                app.running = false;
            }
            None => {}
        }
    }

    Ok(())
}
