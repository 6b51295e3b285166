//! Checkpoint selection lifecycle:
//! Idle → ChoosingCheckpoint → ChoosingScope → Executing → Idle.
//!
//! Navigation and validation problems are handled here and reported as
//! [`Step::Ignored`]; nothing in this module returns an error to the caller.

use rewind_core::{Boundary, CheckpointRecord, RestoreMode, RestoreScope, RewindError};
use serde::Serialize;

// ── Modes ──

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Idle,
    ChoosingCheckpoint,
    ChoosingScope,
    Executing,
}

const VALID_TRANSITIONS: &[(SelectionMode, &[SelectionMode])] = &[
    (SelectionMode::Idle, &[SelectionMode::ChoosingCheckpoint]),
    (
        SelectionMode::ChoosingCheckpoint,
        &[
            SelectionMode::ChoosingCheckpoint,
            SelectionMode::ChoosingScope,
            SelectionMode::Idle,
        ],
    ),
    (
        SelectionMode::ChoosingScope,
        &[
            SelectionMode::ChoosingScope,
            SelectionMode::Executing,
            SelectionMode::ChoosingCheckpoint,
        ],
    ),
    // No path back into ChoosingScope: one restore in flight at a time.
    (SelectionMode::Executing, &[SelectionMode::Idle]),
];

fn is_valid_transition(from: SelectionMode, to: SelectionMode) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ── State ──

/// The live selection session. `pending` is frozen at confirm time so later
/// log changes cannot invalidate it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    ChoosingCheckpoint {
        cursor: usize,
    },
    ChoosingScope {
        pending: CheckpointRecord,
        cursor: usize,
    },
    Executing {
        pending: CheckpointRecord,
        scope: RestoreScope,
        options: RestoreOptions,
    },
}

impl Selection {
    pub fn mode(&self) -> SelectionMode {
        match self {
            Selection::Idle => SelectionMode::Idle,
            Selection::ChoosingCheckpoint { .. } => SelectionMode::ChoosingCheckpoint,
            Selection::ChoosingScope { .. } => SelectionMode::ChoosingScope,
            Selection::Executing { .. } => SelectionMode::Executing,
        }
    }
}

/// Settings applied to a restore at confirm time. Not part of either picker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    pub boundary: Boundary,
    pub mode: RestoreMode,
}

impl RestoreOptions {
    pub fn preview(self) -> Self {
        Self {
            mode: RestoreMode::Preview,
            ..self
        }
    }
}

/// A confirmed (checkpoint, scope) pair ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreIntent {
    pub checkpoint: CheckpointRecord,
    pub scope: RestoreScope,
    pub options: RestoreOptions,
}

/// Result of feeding one signal to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Opened,
    NoCheckpoints,
    Moved { cursor: usize },
    CheckpointChosen,
    Dispatch(RestoreIntent),
    Closed,
    BackToCheckpoints,
    Finished,
    Ignored(RewindError),
}

/// Move `cursor` by `delta`, wrapping within `0..len`.
pub fn wrap_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len_i = len as isize;
    let cur = (cursor.min(len - 1)) as isize;
    (cur + delta).rem_euclid(len_i) as usize
}

#[derive(Debug, Default)]
pub struct SelectionMachine {
    state: Selection,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &Selection {
        &self.state
    }

    pub fn mode(&self) -> SelectionMode {
        self.state.mode()
    }

    pub fn is_idle(&self) -> bool {
        self.mode() == SelectionMode::Idle
    }

    /// Whether a picker is on screen (checkpoint or scope list).
    pub fn is_choosing(&self) -> bool {
        matches!(
            self.mode(),
            SelectionMode::ChoosingCheckpoint | SelectionMode::ChoosingScope
        )
    }

    pub fn checkpoint_cursor(&self) -> Option<usize> {
        match &self.state {
            Selection::ChoosingCheckpoint { cursor } => Some(*cursor),
            _ => None,
        }
    }

    pub fn scope_cursor(&self) -> Option<usize> {
        match &self.state {
            Selection::ChoosingScope { cursor, .. } => Some(*cursor),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&CheckpointRecord> {
        match &self.state {
            Selection::ChoosingScope { pending, .. } | Selection::Executing { pending, .. } => {
                Some(pending)
            }
            _ => None,
        }
    }

    /// The confirmed restore while one is in flight.
    pub fn executing(&self) -> Option<RestoreIntent> {
        match &self.state {
            Selection::Executing {
                pending,
                scope,
                options,
            } => Some(RestoreIntent {
                checkpoint: pending.clone(),
                scope: *scope,
                options: *options,
            }),
            _ => None,
        }
    }

    /// Double gesture. Opens the checkpoint list with a fresh cursor.
    pub fn open(&mut self, checkpoints: &[CheckpointRecord]) -> Step {
        if !self.is_idle() {
            return ignored("gesture", "selection already active");
        }
        if checkpoints.is_empty() {
            return Step::NoCheckpoints;
        }
        self.enter(Selection::ChoosingCheckpoint { cursor: 0 });
        Step::Opened
    }

    /// Move the active cursor by `delta`, wrapping at both ends.
    pub fn navigate(&mut self, delta: isize, checkpoints: &[CheckpointRecord]) -> Step {
        match &self.state {
            Selection::ChoosingCheckpoint { cursor } => {
                if checkpoints.is_empty() {
                    self.enter(Selection::Idle);
                    return Step::NoCheckpoints;
                }
                let cursor = wrap_cursor(*cursor, delta, checkpoints.len());
                self.enter(Selection::ChoosingCheckpoint { cursor });
                Step::Moved { cursor }
            }
            Selection::ChoosingScope { pending, cursor } => {
                let cursor = wrap_cursor(*cursor, delta, RestoreScope::ALL.len());
                let pending = pending.clone();
                self.enter(Selection::ChoosingScope { pending, cursor });
                Step::Moved { cursor }
            }
            Selection::Idle | Selection::Executing { .. } => {
                ignored("navigate", "no list is open")
            }
        }
    }

    /// Confirm the highlighted entry with default options.
    pub fn confirm(&mut self, checkpoints: &[CheckpointRecord]) -> Step {
        self.confirm_with(checkpoints, RestoreOptions::default())
    }

    /// Confirm the highlighted entry. `options` only matter on the scope list.
    pub fn confirm_with(
        &mut self,
        checkpoints: &[CheckpointRecord],
        options: RestoreOptions,
    ) -> Step {
        match &self.state {
            Selection::ChoosingCheckpoint { cursor } => {
                let Some(last) = checkpoints.len().checked_sub(1) else {
                    self.enter(Selection::Idle);
                    return Step::NoCheckpoints;
                };
                let pending = checkpoints[(*cursor).min(last)].clone();
                self.enter(Selection::ChoosingScope { pending, cursor: 0 });
                Step::CheckpointChosen
            }
            Selection::ChoosingScope { pending, cursor } => {
                let intent = RestoreIntent {
                    checkpoint: pending.clone(),
                    scope: RestoreScope::at(*cursor),
                    options,
                };
                self.enter(Selection::Executing {
                    pending: intent.checkpoint.clone(),
                    scope: intent.scope,
                    options,
                });
                Step::Dispatch(intent)
            }
            Selection::Idle | Selection::Executing { .. } => {
                ignored("confirm", "nothing to confirm")
            }
        }
    }

    /// Cancel gesture while a list is open. Always succeeds immediately.
    pub fn cancel(&mut self) -> Step {
        match &self.state {
            Selection::ChoosingCheckpoint { .. } => {
                self.enter(Selection::Idle);
                Step::Closed
            }
            Selection::ChoosingScope { .. } => {
                self.enter(Selection::ChoosingCheckpoint { cursor: 0 });
                Step::BackToCheckpoints
            }
            Selection::Idle => ignored("cancel", "no list is open"),
            Selection::Executing { .. } => ignored("cancel", "restore in progress"),
        }
    }

    /// Completion, error, or timeout of the in-flight restore.
    pub fn finish(&mut self) -> Step {
        if self.mode() != SelectionMode::Executing {
            return ignored("finish", "no restore in progress");
        }
        self.enter(Selection::Idle);
        Step::Finished
    }

    fn enter(&mut self, next: Selection) {
        let (from, to) = (self.mode(), next.mode());
        if !is_valid_transition(from, to) {
            tracing::warn!(?from, ?to, "rejected selection transition");
            return;
        }
        if from != to {
            tracing::debug!(?from, ?to, "selection transition");
        }
        self.state = next;
    }
}

fn ignored(field: &'static str, reason: &str) -> Step {
    Step::Ignored(RewindError::validation(field, reason))
}
