//! Error taxonomy shared by the session components.

use thiserror::Error;

use crate::types::SeqTs;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewindError {
    /// Missing or invalid action or target. Surfaced by the caller, never fatal.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// A double press found nothing to restore.
    #[error("no checkpoints available")]
    NoCheckpointsAvailable,

    /// The engine did not confirm within the bound. The restore may still apply.
    #[error("restore not confirmed after {waited_ms}ms; check the workspace and transcript")]
    RestoreTimeout { waited_ms: u64 },

    /// The engine reported an error. Checkpoint creation is disabled afterwards.
    #[error("restore failed: {0}")]
    RestoreFailure(String),

    /// An incoming entry lost against newer local state. Internal to the reconciler.
    #[error("stale merge rejected at ts={ts}: incoming v{incoming} <= recorded v{recorded}")]
    StaleMergeRejected {
        ts: SeqTs,
        incoming: usize,
        recorded: usize,
    },

    #[error("checkpoints are disabled for this session")]
    CheckpointsDisabled,

    #[error("checkpoint failed: {0}")]
    CheckpointFailed(String),

    #[error("session shut down during restore")]
    Cancelled,
}

impl RewindError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        RewindError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the session may keep taking checkpoints after this error.
    pub fn degrades_session(&self) -> bool {
        matches!(self, RewindError::RestoreFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            RewindError::validation("snapshot_ref", "empty").to_string(),
            "invalid snapshot_ref: empty"
        );
        assert!(RewindError::RestoreTimeout { waited_ms: 5000 }
            .to_string()
            .contains("5000ms"));
    }

    #[test]
    fn only_failures_degrade() {
        assert!(RewindError::RestoreFailure("boom".into()).degrades_session());
        assert!(!RewindError::RestoreTimeout { waited_ms: 1 }.degrades_session());
        assert!(!RewindError::NoCheckpointsAvailable.degrades_session());
    }
}
