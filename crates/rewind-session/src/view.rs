//! Presentation-agnostic projections of the two pickers.

use rewind_core::hash::short_ref;
use rewind_core::{CheckpointRecord, RestoreScope};

const NO_PREVIEW: &str = "(no message)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRow {
    pub short_ref: String,
    pub age: String,
    pub auto_saved: bool,
    pub preview: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointListView {
    pub rows: Vec<CheckpointRow>,
    pub more_above: usize,
    pub more_below: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRow {
    pub label: &'static str,
    pub description: &'static str,
    pub selected: bool,
}

/// Window of at most `visible_rows` records that keeps `cursor` in view.
pub fn checkpoint_list_view(
    records: &[CheckpointRecord],
    cursor: usize,
    visible_rows: usize,
    prefix_chars: usize,
    now_ms: u64,
) -> CheckpointListView {
    let total = records.len();
    let visible = visible_rows.max(1);
    let start = cursor
        .saturating_sub(visible - 1)
        .min(total.saturating_sub(visible));
    let end = (start + visible).min(total);

    let rows = records[start..end]
        .iter()
        .enumerate()
        .map(|(i, cp)| CheckpointRow {
            short_ref: short_ref(&cp.snapshot_ref, prefix_chars).to_string(),
            age: format_age(now_ms.saturating_sub(cp.ts)),
            auto_saved: cp.is_auto_saved,
            preview: cp.preview.clone().unwrap_or_else(|| NO_PREVIEW.to_string()),
            selected: start + i == cursor,
        })
        .collect();

    CheckpointListView {
        rows,
        more_above: start,
        more_below: total - end,
        total,
    }
}

pub fn scope_list_view(cursor: usize) -> Vec<ScopeRow> {
    RestoreScope::ALL
        .iter()
        .enumerate()
        .map(|(i, scope)| ScopeRow {
            label: scope.label(),
            description: scope.description(),
            selected: i == cursor,
        })
        .collect()
}

/// Relative age: "just now", "5m ago", "2h ago", "3d ago".
pub fn format_age(age_ms: u64) -> String {
    let minutes = age_ms / 60_000;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d ago")
    } else if hours > 0 {
        format!("{hours}h ago")
    } else if minutes > 0 {
        format!("{minutes}m ago")
    } else {
        "just now".to_string()
    }
}
