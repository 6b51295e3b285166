mod app;
mod ui;

use std::path::Path;
use std::time::Duration;

use crossterm::event::{self, Event as TermEvent, KeyEventKind};
use rewind_core::hash::now_ms;
use rewind_core::{Event, RewindConfig};
use tokio::runtime::Runtime;

use app::{Action, App};

const TICK: Duration = Duration::from_millis(120);

pub fn run(config: RewindConfig, events: Vec<Event>, export: Option<&Path>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let mut app = App::new(config, events);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &rt, &mut app);
    ratatui::restore();
    app.shutdown.cancel();

    if let (Ok(()), Some(path)) = (&result, export) {
        rewind_log::jsonl::write_events(path, app.session.events())?;
        tracing::info!(
            path = %path.display(),
            events = app.session.events().len(),
            "transcript exported"
        );
    }
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    rt: &Runtime,
    app: &mut App,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(TICK)? {
            match event::read()? {
                TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = app.handle_key(key, now_ms()) {
                        // Show the picker in its executing state before blocking.
                        terminal.draw(|f| ui::render(f, app))?;
                        perform(rt, app, action);
                    }
                }
                _ => {}
            }
        }

        app.tick();

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn perform(rt: &Runtime, app: &mut App, action: Action) {
    let result = match action {
        Action::Restore => rt.block_on(app.session.execute()).map(|_| ()),
        Action::Checkpoint => rt.block_on(app.session.create_checkpoint(false)).map(|_| ()),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "action finished with error");
    }
}
