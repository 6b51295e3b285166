use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use rewind_core::{Boundary, Event, RewindConfig, SeqTs};
use rewind_session::{CollectNotifier, Input, InputContext, LocalEngine, Notice, Session};
use tokio_util::sync::CancellationToken;

/// Canned turns for the `n` key.
const EXCHANGES: &[(&str, &str)] = &[
    (
        "Add a --json flag to the list command",
        "Added the flag and a serializer for the row type.",
    ),
    (
        "Rename Store to Ledger everywhere",
        "Renamed the type and updated 14 call sites.",
    ),
    (
        "Delete the legacy importer",
        "Removed src/import_v1.rs and its tests.",
    ),
    (
        "Make the retry loop exponential",
        "Switched to doubling backoff capped at 30s.",
    ),
];

const STREAMED_REPLY: &str =
    "Reading the module first, then I will split the parser into a lexer and a tree builder and rerun the tests.";

/// Work the event loop must run on the async runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the restore the scope list just confirmed.
    Restore,
    Checkpoint,
}

/// A reply being produced word by word through the local streaming path.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub ts: SeqTs,
    words: Vec<&'static str>,
    emitted: usize,
}

impl StreamState {
    fn new(ts: SeqTs) -> Self {
        Self {
            ts,
            words: STREAMED_REPLY.split_whitespace().collect(),
            emitted: 0,
        }
    }

    /// Emit one more word. Returns the text so far and whether it is final.
    fn advance(&mut self) -> (String, bool) {
        self.emitted = (self.emitted + 1).min(self.words.len());
        let text = self.words[..self.emitted].join(" ");
        (text, self.emitted == self.words.len())
    }
}

/// Application state for the TUI.
pub struct App {
    pub session: Session,
    pub engine: Arc<LocalEngine>,
    pub shutdown: CancellationToken,
    pub should_quit: bool,
    /// Notices from the latest batch, errors first.
    pub status: Vec<Notice>,
    pub stream: Option<StreamState>,
    pub scroll: usize,
    notices: Arc<CollectNotifier>,
    exchanges: usize,
}

impl App {
    pub fn new(config: RewindConfig, events: Vec<Event>) -> Self {
        let (engine, pushes) = LocalEngine::new(events.clone());
        let engine = Arc::new(engine);
        let notices = Arc::new(CollectNotifier::new());
        let shutdown = CancellationToken::new();
        let session = Session::new(
            config,
            engine.clone(),
            pushes,
            events,
            notices.clone(),
            shutdown.clone(),
        );
        Self {
            session,
            engine,
            shutdown,
            should_quit: false,
            status: Vec::new(),
            stream: None,
            scroll: 0,
            notices,
            exchanges: 0,
        }
    }

    fn context(&self) -> InputContext {
        InputContext {
            modal_active: false,
            generating: self.stream.is_some(),
        }
    }

    /// Handle a key press. Returns work that needs the runtime.
    pub fn handle_key(&mut self, key: KeyEvent, now_ms: u64) -> Option<Action> {
        let ctx = self.context();

        if !self.session.selection().is_idle() {
            let input = match key.code {
                KeyCode::Esc => Input::Cancel,
                KeyCode::Char('k') | KeyCode::Up => Input::Up,
                KeyCode::Char('j') | KeyCode::Down => Input::Down,
                KeyCode::Enter => Input::Confirm,
                KeyCode::Char('p') => Input::Preview,
                _ => return None,
            };
            return self
                .session
                .handle_input(input, now_ms, ctx)
                .map(|_| Action::Restore);
        }

        match key.code {
            KeyCode::Esc => {
                self.session.handle_input(Input::Cancel, now_ms, ctx);
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('n') if self.stream.is_none() => self.exchange(),
            KeyCode::Char('s') if self.stream.is_none() => {
                self.stream = Some(StreamState::new(self.engine.next_ts()));
            }
            KeyCode::Char('c') if self.stream.is_none() => return Some(Action::Checkpoint),
            KeyCode::Char('b') => self.toggle_boundary(),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_down(),
            KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            _ => {}
        }
        None
    }

    fn exchange(&mut self) {
        let (prompt, reply) = EXCHANGES[self.exchanges % EXCHANGES.len()];
        self.exchanges += 1;
        let auto = self.session.config().auto_checkpoint && !self.session.is_degraded();
        self.engine.simulate_exchange(prompt, reply, auto);
        self.session.drain_pushes();
    }

    fn toggle_boundary(&mut self) {
        let next = match self.session.boundary() {
            Boundary::Including => Boundary::Before,
            Boundary::Before => Boundary::Including,
        };
        self.session.set_boundary(next);
    }

    fn scroll_down(&mut self) {
        let len = self.session.events().len();
        if self.scroll < len.saturating_sub(1) {
            self.scroll += 1;
        }
    }

    /// Periodic work: advance streaming, merge pushes, pick up notices.
    pub fn tick(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let ts = stream.ts;
            let (text, done) = stream.advance();
            if done {
                self.stream = None;
                self.engine.stream(ts, &text, false);
            } else {
                self.session
                    .apply_local(Event::assistant(ts, text).with_partial(true));
            }
        }
        self.session.drain_pushes();
        let batch = self.notices.drain();
        if !batch.is_empty() {
            self.status = status_notices(batch);
        }
    }
}

/// Progress notices are dropped once a result arrives in the same batch.
fn status_notices(mut batch: Vec<Notice>) -> Vec<Notice> {
    if batch.len() > 1 {
        batch.retain(|n| !matches!(n, Notice::RestoreStarted { .. }));
    }
    batch.sort_by_key(|n| !n.is_error());
    batch
}
