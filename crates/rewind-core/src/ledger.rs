//! Checkpoint ledger: a pure view over the transcript.
//!
//! The checkpoint list is never stored. It is recomputed from the log
//! whenever the log changes; callers memoize on the log revision.

use crate::types::{CheckpointRecord, Event, Payload};

/// Default excerpt length for the preceding user message.
pub const DEFAULT_PREVIEW_CHARS: usize = 60;

const ELLIPSIS: &str = "...";

/// Derive checkpoint records, most recent first.
///
/// One record per `checkpoint_marker` entry. Each record carries an excerpt
/// of the nearest earlier user message, if any.
pub fn derive_checkpoints(events: &[Event], preview_chars: usize) -> Vec<CheckpointRecord> {
    let mut last_user: Option<&str> = None;
    let mut records = Vec::new();

    for ev in events {
        match &ev.payload {
            Payload::UserMessage { text } => last_user = Some(text),
            Payload::CheckpointMarker { snapshot_ref } => records.push(CheckpointRecord {
                ts: ev.ts,
                snapshot_ref: snapshot_ref.clone(),
                is_auto_saved: ev.is_auto_saved(),
                preview: last_user.map(|t| preview_excerpt(t, preview_chars)),
            }),
            Payload::AssistantMessage { .. }
            | Payload::SystemNotice { .. }
            | Payload::CostAccounting(_)
            | Payload::ToolOutput { .. } => {}
        }
    }

    // Stable: markers sharing a timestamp keep reverse log order.
    records.reverse();
    records.sort_by(|a, b| b.ts.cmp(&a.ts));
    records
}

pub fn has_checkpoints(events: &[Event]) -> bool {
    events
        .iter()
        .any(|e| matches!(e.payload, Payload::CheckpointMarker { .. }))
}

pub fn checkpoint_count(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e.payload, Payload::CheckpointMarker { .. }))
        .count()
}

/// Single-line excerpt bounded to `max_chars`, with an ellipsis when cut.
pub fn preview_excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = flat.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}{ELLIPSIS}")
    } else {
        truncated
    }
}
