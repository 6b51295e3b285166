use std::sync::Mutex;

use rewind_core::{RestoreScope, SeqTs, SnapshotRef, UsageSummary};

/// User-visible side-channel messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NoCheckpoints,
    RestoreStarted {
        snapshot_ref: SnapshotRef,
        scope: RestoreScope,
    },
    WorkspaceRestored {
        snapshot_ref: SnapshotRef,
    },
    ConversationRestored {
        ts: SeqTs,
        discarded: UsageSummary,
    },
    /// A dry run finished; nothing was changed.
    RestorePreviewed {
        ts: SeqTs,
        scope: RestoreScope,
        log_len: usize,
        discarded: Option<UsageSummary>,
    },
    RestoreTimedOut {
        waited_ms: u64,
    },
    RestoreFailed {
        message: String,
    },
    CheckpointCreated {
        snapshot_ref: SnapshotRef,
        auto_saved: bool,
    },
    CheckpointsDisabled,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::RestoreTimedOut { .. }
                | Notice::RestoreFailed { .. }
                | Notice::CheckpointsDisabled
        )
    }

    pub fn message(&self) -> String {
        match self {
            Notice::NoCheckpoints => "No checkpoints to restore yet".into(),
            Notice::RestoreStarted { snapshot_ref, scope } => {
                format!("Restoring {} ({})", short(snapshot_ref), scope.label().to_lowercase())
            }
            Notice::WorkspaceRestored { snapshot_ref } => {
                format!("Workspace restored to {}", short(snapshot_ref))
            }
            Notice::ConversationRestored { discarded, .. } if discarded.is_empty() => {
                "Conversation restored".into()
            }
            Notice::ConversationRestored { discarded, .. } => format!(
                "Conversation restored; discarded {} request(s), {} in / {} out tokens, ${:.4}",
                discarded.requests, discarded.tokens_in, discarded.tokens_out, discarded.cost_usd
            ),
            Notice::RestorePreviewed {
                scope,
                log_len,
                discarded,
                ..
            } => {
                let mut msg = format!(
                    "Preview ({}): transcript would keep {log_len} entries",
                    scope.label().to_lowercase()
                );
                if let Some(d) = discarded.filter(|d| !d.is_empty()) {
                    msg.push_str(&format!(
                        ", discarding {} request(s), ${:.4}",
                        d.requests, d.cost_usd
                    ));
                }
                msg
            }
            Notice::RestoreTimedOut { waited_ms } => format!(
                "Restore not confirmed after {waited_ms}ms. It may still have applied; check the workspace and transcript"
            ),
            Notice::RestoreFailed { message } => {
                format!("Restore failed: {message}. Checkpoints are disabled for this session")
            }
            Notice::CheckpointCreated {
                snapshot_ref,
                auto_saved,
            } => {
                let kind = if *auto_saved { "Auto checkpoint" } else { "Checkpoint" };
                format!("{kind} {} saved", short(snapshot_ref))
            }
            Notice::CheckpointsDisabled => "Checkpoints are disabled for this session".into(),
        }
    }
}

fn short(snapshot_ref: &str) -> &str {
    rewind_core::hash::short_ref(snapshot_ref, 8)
}

/// Notification sink for session notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Collects notices in memory; the UI drains it each frame.
#[derive(Default)]
pub struct CollectNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Notifier for CollectNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}
