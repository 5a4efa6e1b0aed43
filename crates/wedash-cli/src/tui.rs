use std::{io, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::Receiver;
use wedash_core::{Dashboard, DashboardEvent};

use crate::{
    app::{App, Input},
    ui,
};

/// Redraw period, so the log pane keeps up with a followed stream.
const REDRAW: Duration = Duration::from_millis(200);

type Term = Terminal<CrosstermBackend<io::Stdout>>;

fn setup_terminal() -> io::Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(mut terminal: Term) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the interactive dashboard until the operator quits, then shut the
/// dashboard down.
pub async fn run(
    dashboard: Dashboard,
    mut events: Receiver<DashboardEvent>,
    mut app: App,
) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &dashboard, &mut events, &mut app).await;
    restore_terminal(terminal)?;

    tracing::info!("Shutting down");
    dashboard.shutdown().await?;
    result
}

async fn event_loop(
    terminal: &mut Term,
    dashboard: &Dashboard,
    events: &mut Receiver<DashboardEvent>,
    app: &mut App,
) -> Result<()> {
    let mut input = EventStream::new();
    let mut redraw = tokio::time::interval(REDRAW);

    if let Some(command) = app.select_current() {
        dashboard.send(command).await?;
    }

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            _ = redraw.tick() => {}
            Some(event) = events.recv() => app.apply_event(event),
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    match app.handle_key(key) {
                        Input::Quit => break,
                        Input::Command(command) => dashboard.send(command).await?,
                        Input::Ignored => {}
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
        }
    }

    Ok(())
}
