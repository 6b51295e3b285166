use serde::{Deserialize, Serialize};

/// Ordering key of a transcript entry (milliseconds since the Unix epoch).
/// Not required to be unique or gapless; the reconciler keys entries by it.
pub type SeqTs = u64;

/// Identity of a transcript entry for reconciliation. Entries of different
/// kinds may share a `ts`; two entries of the same kind at one `ts` are the
/// same logical entry.
pub type EntryKey = (SeqTs, EventKind);

/// Content-addressed identifier of a workspace snapshot (commit-like hash).
pub type SnapshotRef = String;

/// Metadata key marking a checkpoint that was taken automatically.
pub const META_AUTO_SAVED: &str = "auto_saved";

/// Token and cost figures attached to a `cost_accounting` entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CostMetrics {
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    #[serde(default)]
    pub cache_writes: u64,
    #[serde(default)]
    pub cache_reads: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

/// Kind-specific content of a transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    UserMessage { text: String },
    AssistantMessage { text: String },
    SystemNotice { text: String },
    CheckpointMarker { snapshot_ref: SnapshotRef },
    CostAccounting(CostMetrics),
    ToolOutput { tool: String, text: String },
}

/// Fieldless projection of [`Payload`] for exhaustive matching and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserMessage,
    AssistantMessage,
    SystemNotice,
    CheckpointMarker,
    CostAccounting,
    ToolOutput,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::UserMessage => "user_message",
            EventKind::AssistantMessage => "assistant_message",
            EventKind::SystemNotice => "system_notice",
            EventKind::CheckpointMarker => "checkpoint_marker",
            EventKind::CostAccounting => "cost_accounting",
            EventKind::ToolOutput => "tool_output",
        }
    }
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::UserMessage { .. } => EventKind::UserMessage,
            Payload::AssistantMessage { .. } => EventKind::AssistantMessage,
            Payload::SystemNotice { .. } => EventKind::SystemNotice,
            Payload::CheckpointMarker { .. } => EventKind::CheckpointMarker,
            Payload::CostAccounting(_) => EventKind::CostAccounting,
            Payload::ToolOutput { .. } => EventKind::ToolOutput,
        }
    }

    /// Text carried by the payload, if it is a text-bearing kind.
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::UserMessage { text }
            | Payload::AssistantMessage { text }
            | Payload::SystemNotice { text }
            | Payload::ToolOutput { text, .. } => Some(text),
            Payload::CheckpointMarker { .. } | Payload::CostAccounting(_) => None,
        }
    }
}

/// A single transcript entry (one JSONL line in a transcript file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub ts: SeqTs,
    pub payload: Payload,
    /// True while the entry is still being produced and may grow.
    #[serde(default)]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    pub fn new(ts: SeqTs, payload: Payload) -> Self {
        Self {
            ts,
            payload,
            partial: false,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn user(ts: SeqTs, text: impl Into<String>) -> Self {
        Self::new(ts, Payload::UserMessage { text: text.into() })
    }

    pub fn assistant(ts: SeqTs, text: impl Into<String>) -> Self {
        Self::new(ts, Payload::AssistantMessage { text: text.into() })
    }

    pub fn notice(ts: SeqTs, text: impl Into<String>) -> Self {
        Self::new(ts, Payload::SystemNotice { text: text.into() })
    }

    pub fn checkpoint(ts: SeqTs, snapshot_ref: impl Into<String>) -> Self {
        Self::new(
            ts,
            Payload::CheckpointMarker {
                snapshot_ref: snapshot_ref.into(),
            },
        )
    }

    pub fn cost(ts: SeqTs, metrics: CostMetrics) -> Self {
        Self::new(ts, Payload::CostAccounting(metrics))
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn with_meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn key(&self) -> EntryKey {
        (self.ts, self.kind())
    }

    /// Logical version used for staleness checks: content length observed so far.
    pub fn version(&self) -> usize {
        self.payload.text().map(str::len).unwrap_or(0)
    }

    pub fn is_auto_saved(&self) -> bool {
        self.metadata
            .get(META_AUTO_SAVED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// A checkpoint as shown to the user. Derived from the log, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub ts: SeqTs,
    pub snapshot_ref: SnapshotRef,
    pub is_auto_saved: bool,
    pub preview: Option<String>,
}

/// Which half of a checkpoint is restored.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RestoreScope {
    #[default]
    Both,
    ConversationOnly,
    CodeOnly,
}

impl RestoreScope {
    /// The fixed option list, in display order.
    pub const ALL: [RestoreScope; 3] = [
        RestoreScope::Both,
        RestoreScope::ConversationOnly,
        RestoreScope::CodeOnly,
    ];

    pub fn at(index: usize) -> RestoreScope {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn restores_workspace(self) -> bool {
        matches!(self, RestoreScope::Both | RestoreScope::CodeOnly)
    }

    pub fn restores_conversation(self) -> bool {
        matches!(self, RestoreScope::Both | RestoreScope::ConversationOnly)
    }

    pub fn label(self) -> &'static str {
        match self {
            RestoreScope::Both => "Restore code and conversation",
            RestoreScope::ConversationOnly => "Restore conversation",
            RestoreScope::CodeOnly => "Restore code",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RestoreScope::Both => "Roll back workspace files and truncate the transcript",
            RestoreScope::ConversationOnly => "Truncate the transcript, keep workspace files",
            RestoreScope::CodeOnly => "Roll back workspace files, keep the transcript",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// Must not mutate persisted state.
    Preview,
    #[default]
    Restore,
}

/// Where a conversation restore cuts the log relative to the marker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Keep the checkpoint's own marker.
    #[default]
    Including,
    /// Restore to the state just before the marker.
    Before,
}

impl Boundary {
    /// Whether an entry at `ts` survives a cut at `marker_ts`.
    pub fn keeps(self, ts: SeqTs, marker_ts: SeqTs) -> bool {
        match self {
            Boundary::Including => ts <= marker_ts,
            Boundary::Before => ts < marker_ts,
        }
    }
}

/// Request sent to the external engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub timestamp: SeqTs,
    pub snapshot_ref: SnapshotRef,
    #[serde(default)]
    pub scope: RestoreScope,
    #[serde(default)]
    pub mode: RestoreMode,
    #[serde(default)]
    pub boundary: Boundary,
}

impl RestoreRequest {
    pub fn for_checkpoint(checkpoint: &CheckpointRecord, scope: RestoreScope) -> Self {
        Self {
            timestamp: checkpoint.ts,
            snapshot_ref: checkpoint.snapshot_ref.clone(),
            scope,
            mode: RestoreMode::Restore,
            boundary: Boundary::default(),
        }
    }

    pub fn with_mode(mut self, mode: RestoreMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Whether the reconciled push after this request may delete entries.
    pub fn truncates(&self) -> bool {
        self.mode == RestoreMode::Restore && self.scope.restores_conversation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_serializes_kind_tag() {
        let ev = Event::user(10, "hello");
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["ts"], 10);
        assert_eq!(v["payload"]["kind"], "user_message");
        assert_eq!(v["payload"]["text"], "hello");
        assert_eq!(v["partial"], false);
        assert!(v.get("metadata").is_none());
    }

    #[test]
    fn event_partial_defaults_false_when_missing() {
        let ev: Event = serde_json::from_value(json!({
            "ts": 5,
            "payload": {"kind": "assistant_message", "text": "hi"}
        }))
        .unwrap();
        assert!(!ev.partial);
        assert_eq!(ev.kind(), EventKind::AssistantMessage);
    }

    #[test]
    fn cost_payload_parses_flat_fields() {
        let ev: Event = serde_json::from_value(json!({
            "ts": 7,
            "payload": {"kind": "cost_accounting", "tokens_in": 12, "cost_usd": 0.5}
        }))
        .unwrap();
        match ev.payload {
            Payload::CostAccounting(m) => {
                assert_eq!(m.tokens_in, 12);
                assert_eq!(m.tokens_out, 0);
                assert!((m.cost_usd - 0.5).abs() < f64::EPSILON);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn version_is_text_length() {
        assert_eq!(Event::assistant(1, "abcd").version(), 4);
        assert_eq!(Event::checkpoint(1, "aaa").version(), 0);
    }

    #[test]
    fn auto_saved_reads_metadata() {
        let ev = Event::checkpoint(1, "abc").with_meta(META_AUTO_SAVED, json!(true));
        assert!(ev.is_auto_saved());
        assert!(!Event::checkpoint(1, "abc").is_auto_saved());
    }

    #[test]
    fn scope_wire_names() {
        assert_eq!(serde_json::to_value(RestoreScope::Both).unwrap(), "both");
        assert_eq!(
            serde_json::to_value(RestoreScope::ConversationOnly).unwrap(),
            "conversationOnly"
        );
        assert_eq!(serde_json::to_value(RestoreScope::CodeOnly).unwrap(), "codeOnly");
    }

    #[test]
    fn request_scope_defaults_to_both() {
        let req: RestoreRequest = serde_json::from_value(json!({
            "timestamp": 20,
            "snapshotRef": "abc",
        }))
        .unwrap();
        assert_eq!(req.scope, RestoreScope::Both);
        assert_eq!(req.mode, RestoreMode::Restore);
        assert_eq!(req.boundary, Boundary::Including);
    }

    #[test]
    fn request_wire_shape() {
        let cp = CheckpointRecord {
            ts: 20,
            snapshot_ref: "BBB".into(),
            is_auto_saved: false,
            preview: None,
        };
        let req = RestoreRequest::for_checkpoint(&cp, RestoreScope::CodeOnly);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["timestamp"], 20);
        assert_eq!(v["snapshotRef"], "BBB");
        assert_eq!(v["scope"], "codeOnly");
        assert_eq!(v["mode"], "restore");
    }

    #[test]
    fn only_conversation_restores_truncate() {
        let cp = CheckpointRecord {
            ts: 1,
            snapshot_ref: "a".into(),
            is_auto_saved: false,
            preview: None,
        };
        assert!(RestoreRequest::for_checkpoint(&cp, RestoreScope::Both).truncates());
        assert!(RestoreRequest::for_checkpoint(&cp, RestoreScope::ConversationOnly).truncates());
        assert!(!RestoreRequest::for_checkpoint(&cp, RestoreScope::CodeOnly).truncates());
        assert!(!RestoreRequest::for_checkpoint(&cp, RestoreScope::Both)
            .with_mode(RestoreMode::Preview)
            .truncates());
    }

    #[test]
    fn boundary_cuts() {
        assert!(Boundary::Including.keeps(20, 20));
        assert!(!Boundary::Before.keeps(20, 20));
        assert!(Boundary::Before.keeps(19, 20));
        assert!(!Boundary::Including.keeps(21, 20));
    }

    #[test]
    fn scope_at_wraps() {
        assert_eq!(RestoreScope::at(0), RestoreScope::Both);
        assert_eq!(RestoreScope::at(2), RestoreScope::CodeOnly);
        assert_eq!(RestoreScope::at(3), RestoreScope::Both);
    }
}
