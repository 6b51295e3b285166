//! Per-session owner of the log, the pickers, and the restore path.
//!
//! Input handling and merges run on the caller's control flow and never
//! block. [`Session::execute`] is the only suspending operation; while it
//! waits it keeps merging engine pushes so the coordinator can observe the
//! reconciled generation.

use std::sync::Arc;
use std::time::Duration;

use rewind_core::ledger::derive_checkpoints;
use rewind_core::{
    Boundary, CheckpointRecord, Event, RestoreMode, RestoreScope, RewindConfig, RewindError,
    SnapshotRef,
};
use rewind_log::{EventLog, MergeMode, MergeReport, Reconciler};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::coordinator::{RestoreCoordinator, RestoreOutcome};
use crate::engine::{EnginePush, RestoreEngine};
use crate::gesture::GestureDetector;
use crate::notify::{Notice, Notifier};
use crate::selection::{RestoreIntent, RestoreOptions, SelectionMachine, SelectionMode, Step};
use crate::view::{checkpoint_list_view, scope_list_view, CheckpointListView, ScopeRow};

/// Abstract input signals. Device bindings live in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Cancel,
    Up,
    Down,
    Confirm,
    /// Confirm the scope list as a dry run.
    Preview,
}

/// Who else currently claims the cancel key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputContext {
    /// An approval prompt, autocomplete, history browser, or similar is open.
    pub modal_active: bool,
    /// A long-running generation is in progress.
    pub generating: bool,
}

#[derive(Debug, Default)]
struct CheckpointCache {
    revision: Option<u64>,
    records: Vec<CheckpointRecord>,
}

pub struct Session {
    config: RewindConfig,
    reconciler: Reconciler,
    selection: SelectionMachine,
    gesture: GestureDetector,
    coordinator: RestoreCoordinator,
    engine: Arc<dyn RestoreEngine>,
    pushes: mpsc::UnboundedReceiver<EnginePush>,
    reconciled: watch::Sender<u64>,
    notifier: Arc<dyn Notifier>,
    cache: CheckpointCache,
    checkpoints_disabled: bool,
    current_snapshot: Option<SnapshotRef>,
    boundary: Boundary,
}

impl Session {
    pub fn new(
        config: RewindConfig,
        engine: Arc<dyn RestoreEngine>,
        pushes: mpsc::UnboundedReceiver<EnginePush>,
        initial: Vec<Event>,
        notifier: Arc<dyn Notifier>,
        shutdown: CancellationToken,
    ) -> Self {
        let (reconciled, reconciled_rx) = watch::channel(0);
        let coordinator = RestoreCoordinator::new(
            engine.clone(),
            reconciled_rx,
            Duration::from_millis(config.restore_timeout_ms),
            shutdown,
        );
        Self {
            gesture: GestureDetector::new(config.double_press_window_ms),
            config,
            reconciler: Reconciler::new(EventLog::from_events(initial)),
            selection: SelectionMachine::new(),
            coordinator,
            engine,
            pushes,
            reconciled,
            notifier,
            cache: CheckpointCache::default(),
            checkpoints_disabled: false,
            current_snapshot: None,
            boundary: Boundary::default(),
        }
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn log(&self) -> &EventLog {
        self.reconciler.log()
    }

    pub fn events(&self) -> &[Event] {
        self.reconciler.events()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn selection(&self) -> &SelectionMachine {
        &self.selection
    }

    pub fn mode(&self) -> SelectionMode {
        self.selection.mode()
    }

    /// True once a restore failure disabled checkpoint creation.
    pub fn is_degraded(&self) -> bool {
        self.checkpoints_disabled
    }

    pub fn current_snapshot(&self) -> Option<&str> {
        self.current_snapshot.as_deref()
    }

    /// Where the next conversation restore cuts relative to its marker.
    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn set_boundary(&mut self, boundary: Boundary) {
        self.boundary = boundary;
    }

    pub fn is_streaming(&self) -> bool {
        self.reconciler.log().has_partial()
    }

    /// Checkpoints, most recent first. Recomputed only when the log changed.
    pub fn checkpoints(&mut self) -> &[CheckpointRecord] {
        self.refresh_checkpoints();
        &self.cache.records
    }

    fn refresh_checkpoints(&mut self) {
        let revision = self.reconciler.log().revision();
        if self.cache.revision != Some(revision) {
            self.cache.records =
                derive_checkpoints(self.reconciler.events(), self.config.preview_chars);
            self.cache.revision = Some(revision);
        }
    }

    /// Feed one input signal. Returns the confirmed restore, if any; the
    /// caller then runs [`Session::execute`].
    pub fn handle_input(
        &mut self,
        input: Input,
        now_ms: u64,
        ctx: InputContext,
    ) -> Option<RestoreIntent> {
        self.refresh_checkpoints();
        let options = RestoreOptions {
            boundary: self.boundary,
            mode: RestoreMode::Restore,
        };
        let step = match (input, self.selection.mode()) {
            (Input::Cancel, SelectionMode::Idle) => {
                if ctx.modal_active || ctx.generating || self.is_streaming() {
                    self.gesture.reset_timer();
                    return None;
                }
                if !self.gesture.on_cancel_pressed(now_ms) {
                    return None;
                }
                self.gesture.reset_timer();
                self.selection.open(&self.cache.records)
            }
            (Input::Cancel, _) => {
                let step = self.selection.cancel();
                if self.selection.is_idle() {
                    self.gesture.reset_timer();
                }
                step
            }
            (Input::Up, _) => self.selection.navigate(-1, &self.cache.records),
            (Input::Down, _) => self.selection.navigate(1, &self.cache.records),
            (Input::Confirm, _) => self.selection.confirm_with(&self.cache.records, options),
            (Input::Preview, SelectionMode::ChoosingScope) => {
                self.selection.confirm_with(&self.cache.records, options.preview())
            }
            (Input::Preview, _) => Step::Ignored(RewindError::validation(
                "preview",
                "scope list is not open",
            )),
        };

        match step {
            Step::Dispatch(intent) => return Some(intent),
            Step::NoCheckpoints => self.notifier.notify(Notice::NoCheckpoints),
            Step::Ignored(err) => tracing::debug!(error = %err, ?input, "input ignored"),
            Step::Opened
            | Step::Moved { .. }
            | Step::CheckpointChosen
            | Step::Closed
            | Step::BackToCheckpoints
            | Step::Finished => {}
        }
        None
    }

    /// Run the confirmed restore to completion, timeout, or failure. Always
    /// leaves the selection idle.
    pub async fn execute(&mut self) -> Result<RestoreOutcome, RewindError> {
        let Some(intent) = self.selection.executing() else {
            return Err(RewindError::validation("restore", "no confirmed selection"));
        };
        if self.checkpoints_disabled {
            tracing::warn!("restoring from a degraded session");
        }

        let plan = self.coordinator.plan(&intent, self.reconciler.events());
        self.notifier.notify(Notice::RestoreStarted {
            snapshot_ref: plan.request.snapshot_ref.clone(),
            scope: plan.request.scope,
        });

        let coordinator = self.coordinator.clone();
        let restore = coordinator.execute(plan);
        tokio::pin!(restore);
        let result = loop {
            tokio::select! {
                res = &mut restore => break res,
                Some(push) = self.pushes.recv() => {
                    self.apply_push(push);
                }
            }
        };

        self.selection.finish();
        self.report(&result);
        result
    }

    fn report(&mut self, result: &Result<RestoreOutcome, RewindError>) {
        match result {
            Ok(outcome) if outcome.request.mode == RestoreMode::Preview => {
                self.notifier.notify(Notice::RestorePreviewed {
                    ts: outcome.request.timestamp,
                    scope: outcome.request.scope,
                    log_len: outcome.ack.log_len,
                    discarded: outcome.discarded,
                });
            }
            Ok(outcome) => {
                let scope = outcome.request.scope;
                if scope.restores_workspace() {
                    let snapshot_ref = outcome
                        .ack
                        .snapshot_ref
                        .clone()
                        .unwrap_or_else(|| outcome.request.snapshot_ref.clone());
                    self.current_snapshot = Some(snapshot_ref.clone());
                    self.notifier.notify(Notice::WorkspaceRestored { snapshot_ref });
                }
                if scope.restores_conversation() {
                    self.notifier.notify(Notice::ConversationRestored {
                        ts: outcome.request.timestamp,
                        discarded: outcome.discarded.unwrap_or_default(),
                    });
                }
            }
            Err(RewindError::RestoreTimeout { waited_ms }) => {
                self.notifier.notify(Notice::RestoreTimedOut {
                    waited_ms: *waited_ms,
                });
            }
            Err(RewindError::RestoreFailure(message)) => {
                self.checkpoints_disabled = true;
                self.notifier.notify(Notice::RestoreFailed {
                    message: message.clone(),
                });
            }
            Err(err) => tracing::warn!(error = %err, "restore ended"),
        }
    }

    /// Apply one engine push. Returns the merge report for log pushes.
    pub fn apply_push(&mut self, push: EnginePush) -> Option<MergeReport> {
        match push {
            EnginePush::LogReplaced {
                events,
                generation,
                truncating,
            } => {
                let mode = if truncating {
                    MergeMode::Truncating
                } else {
                    MergeMode::Incremental
                };
                let report = self.reconciler.merge(events, mode);
                self.reconciled.send_modify(|g| *g = (*g).max(generation));
                Some(report)
            }
            EnginePush::SnapshotUpdated { snapshot_ref } => {
                tracing::debug!(%snapshot_ref, "current snapshot updated");
                self.current_snapshot = Some(snapshot_ref);
                None
            }
        }
    }

    /// Apply every push already queued, without waiting. Returns how many.
    pub fn drain_pushes(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(push) = self.pushes.try_recv() {
            self.apply_push(push);
            applied += 1;
        }
        applied
    }

    /// Record an entry produced locally (e.g. streamed output).
    pub fn apply_local(&mut self, event: Event) {
        self.reconciler.apply_local(event);
    }

    /// Ask the engine for a new checkpoint. Refused once the session is degraded.
    pub async fn create_checkpoint(
        &mut self,
        auto_saved: bool,
    ) -> Result<SnapshotRef, RewindError> {
        if self.checkpoints_disabled {
            self.notifier.notify(Notice::CheckpointsDisabled);
            return Err(RewindError::CheckpointsDisabled);
        }
        let snapshot_ref = self
            .engine
            .create_checkpoint(auto_saved)
            .await
            .map_err(|e| RewindError::CheckpointFailed(e.to_string()))?;
        self.drain_pushes();
        self.current_snapshot = Some(snapshot_ref.clone());
        self.notifier.notify(Notice::CheckpointCreated {
            snapshot_ref: snapshot_ref.clone(),
            auto_saved,
        });
        Ok(snapshot_ref)
    }

    /// Checkpoint picker projection, while it is open.
    pub fn checkpoint_view(&mut self, now_ms: u64) -> Option<CheckpointListView> {
        let cursor = self.selection.checkpoint_cursor()?;
        self.refresh_checkpoints();
        Some(checkpoint_list_view(
            &self.cache.records,
            cursor,
            self.config.visible_rows,
            self.config.snapshot_prefix_chars,
            now_ms,
        ))
    }

    /// Scope picker projection, while it is open.
    pub fn scope_view(&self) -> Option<(CheckpointRecord, Vec<ScopeRow>)> {
        let cursor = self.selection.scope_cursor()?;
        let pending = self.selection.pending()?.clone();
        Some((pending, scope_list_view(cursor)))
    }

    pub fn scope_at_cursor(&self) -> Option<RestoreScope> {
        self.selection.scope_cursor().map(RestoreScope::at)
    }
}
