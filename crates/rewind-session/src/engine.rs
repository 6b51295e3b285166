//! Boundary to the authoritative writer that owns the transcript and the
//! workspace snapshots.

use rewind_core::{Event, RestoreRequest, SnapshotRef};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("checkpoint not found: ts={ts} ref={snapshot_ref}")]
    CheckpointNotFound { ts: u64, snapshot_ref: SnapshotRef },

    #[error("workspace restore failed: {0}")]
    Workspace(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Acknowledgement that the engine produced a new authoritative state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreAck {
    /// Generation of the log push that carries the result. The coordinator
    /// waits until the session has reconciled at least this generation.
    pub generation: u64,
    /// Current snapshot after a workspace rollback.
    pub snapshot_ref: Option<SnapshotRef>,
    /// The log as it is (restore) or would be (preview) afterwards.
    pub log_len: usize,
}

/// Messages pushed down from the engine to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePush {
    /// Full authoritative log replacement.
    LogReplaced {
        events: Vec<Event>,
        generation: u64,
        /// Set only when the push follows a restore-mode request that
        /// touched the conversation.
        truncating: bool,
    },
    /// Informational; not needed for correctness of the log merge.
    SnapshotUpdated { snapshot_ref: SnapshotRef },
}

/// Trait for the restore backend. Implemented by [`crate::LocalEngine`]
/// (in-process reference writer, also used by tests).
#[async_trait::async_trait]
pub trait RestoreEngine: Send + Sync {
    /// Apply (or preview) a restore. Results arrive through the push channel.
    async fn restore(&self, request: RestoreRequest) -> Result<RestoreAck, EngineError>;

    /// Snapshot the workspace and append a checkpoint marker.
    async fn create_checkpoint(&self, auto_saved: bool) -> Result<SnapshotRef, EngineError>;
}
