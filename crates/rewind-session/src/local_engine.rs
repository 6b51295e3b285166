//! In-process authoritative writer.
//!
//! Holds the authoritative transcript and the current workspace snapshot
//! reference, and pushes every change to the session over a channel. Also
//! carries fault-injection switches used by the restore tests.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rewind_core::hash::{now_ms, snapshot_ref};
use rewind_core::{
    CostMetrics, Event, Payload, RestoreMode, RestoreRequest, SeqTs, SnapshotRef,
    META_AUTO_SAVED,
};
use tokio::sync::mpsc;

use crate::engine::{EngineError, EnginePush, RestoreAck, RestoreEngine};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    snapshot: Option<SnapshotRef>,
    generation: u64,
    fail_next: Option<EngineError>,
    push_delay: Option<Duration>,
    suppress_pushes: bool,
}

pub struct LocalEngine {
    inner: Mutex<Inner>,
    tx: mpsc::UnboundedSender<EnginePush>,
}

impl LocalEngine {
    /// Create an engine seeded with `events`, returning the push receiver.
    pub fn new(mut events: Vec<Event>) -> (Self, mpsc::UnboundedReceiver<EnginePush>) {
        events.sort_by_key(|e| e.ts);
        let snapshot = events.iter().rev().find_map(|e| match &e.payload {
            Payload::CheckpointMarker { snapshot_ref } => Some(snapshot_ref.clone()),
            _ => None,
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            inner: Mutex::new(Inner {
                events,
                snapshot,
                ..Default::default()
            }),
            tx,
        };
        (engine, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn current_snapshot(&self) -> Option<SnapshotRef> {
        self.lock().snapshot.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Make the next restore fail with `err`.
    pub fn fail_next_restore(&self, err: EngineError) {
        self.lock().fail_next = Some(err);
    }

    /// Deliver log pushes after `delay` instead of immediately.
    pub fn set_push_delay(&self, delay: Option<Duration>) {
        self.lock().push_delay = delay;
    }

    /// Acknowledge restores without ever pushing the resulting log.
    pub fn suppress_pushes(&self, suppress: bool) {
        self.lock().suppress_pushes = suppress;
    }

    /// Next free ordering key: wall clock, but strictly after the last entry.
    pub fn next_ts(&self) -> SeqTs {
        let inner = self.lock();
        next_ts_after(&inner.events)
    }

    /// Append a finalized entry and push the log.
    pub fn append(&self, event: Event) {
        let mut inner = self.lock();
        upsert(&mut inner.events, event);
        self.push_log(&mut inner, false);
    }

    /// Write (or overwrite) a streaming entry and push the log.
    pub fn stream(&self, ts: SeqTs, text: &str, partial: bool) {
        self.append(Event::assistant(ts, text).with_partial(partial));
    }

    /// One user turn: prompt, reply, usage, and optionally an auto checkpoint.
    pub fn simulate_exchange(&self, prompt: &str, reply: &str, auto_checkpoint: bool) {
        let mut inner = self.lock();
        let ts = next_ts_after(&inner.events);
        upsert(&mut inner.events, Event::user(ts, prompt));
        upsert(&mut inner.events, Event::assistant(ts + 1, reply));
        upsert(
            &mut inner.events,
            Event::cost(
                ts + 2,
                CostMetrics {
                    tokens_in: prompt.len() as u64 * 4,
                    tokens_out: reply.len() as u64 * 4,
                    cost_usd: (prompt.len() + reply.len()) as f64 * 0.00001,
                    ..Default::default()
                },
            ),
        );
        if auto_checkpoint {
            let marker = self.new_marker(&mut inner, ts + 3, true);
            inner.snapshot = Some(marker);
        }
        self.push_log(&mut inner, false);
    }

    fn new_marker(&self, inner: &mut Inner, ts: SeqTs, auto_saved: bool) -> SnapshotRef {
        let mut material = serde_json::to_vec(&inner.events).unwrap_or_default();
        material.extend_from_slice(&ts.to_le_bytes());
        let r = snapshot_ref(&material);
        upsert(
            &mut inner.events,
            Event::checkpoint(ts, r.clone()).with_meta(META_AUTO_SAVED, auto_saved.into()),
        );
        r
    }

    fn push_log(&self, inner: &mut Inner, truncating: bool) {
        inner.generation += 1;
        if inner.suppress_pushes {
            tracing::debug!(generation = inner.generation, "push suppressed");
            return;
        }
        let push = EnginePush::LogReplaced {
            events: inner.events.clone(),
            generation: inner.generation,
            truncating,
        };
        self.send(push, inner.push_delay);
    }

    fn send(&self, push: EnginePush, delay: Option<Duration>) {
        match delay {
            None => {
                let _ = self.tx.send(push);
            }
            Some(delay) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(push);
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl RestoreEngine for LocalEngine {
    async fn restore(&self, request: RestoreRequest) -> Result<RestoreAck, EngineError> {
        if request.snapshot_ref.trim().is_empty() {
            return Err(EngineError::InvalidRequest("empty snapshot ref".into()));
        }

        let mut inner = self.lock();
        let found = inner.events.iter().any(|e| match &e.payload {
            Payload::CheckpointMarker { snapshot_ref } => {
                e.ts == request.timestamp && *snapshot_ref == request.snapshot_ref
            }
            _ => false,
        });
        if !found {
            return Err(EngineError::CheckpointNotFound {
                ts: request.timestamp,
                snapshot_ref: request.snapshot_ref,
            });
        }
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }

        let kept = |events: &[Event]| {
            events
                .iter()
                .filter(|e| request.boundary.keeps(e.ts, request.timestamp))
                .count()
        };

        if request.mode == RestoreMode::Preview {
            let log_len = if request.scope.restores_conversation() {
                kept(&inner.events)
            } else {
                inner.events.len()
            };
            return Ok(RestoreAck {
                generation: inner.generation,
                snapshot_ref: None,
                log_len,
            });
        }

        let mut restored_snapshot = None;
        if request.scope.restores_workspace() {
            inner.snapshot = Some(request.snapshot_ref.clone());
            restored_snapshot = Some(request.snapshot_ref.clone());
            self.send(
                EnginePush::SnapshotUpdated {
                    snapshot_ref: request.snapshot_ref.clone(),
                },
                None,
            );
        }
        if request.scope.restores_conversation() {
            let boundary = request.boundary;
            let marker_ts = request.timestamp;
            inner.events.retain(|e| boundary.keeps(e.ts, marker_ts));
        }
        self.push_log(&mut inner, request.truncates());

        tracing::info!(
            ts = request.timestamp,
            snapshot_ref = %request.snapshot_ref,
            scope = ?request.scope,
            generation = inner.generation,
            "engine applied restore"
        );
        Ok(RestoreAck {
            generation: inner.generation,
            snapshot_ref: restored_snapshot,
            log_len: inner.events.len(),
        })
    }

    async fn create_checkpoint(&self, auto_saved: bool) -> Result<SnapshotRef, EngineError> {
        let mut inner = self.lock();
        let ts = next_ts_after(&inner.events);
        let r = self.new_marker(&mut inner, ts, auto_saved);
        inner.snapshot = Some(r.clone());
        self.push_log(&mut inner, false);
        Ok(r)
    }
}

fn next_ts_after(events: &[Event]) -> SeqTs {
    let last = events.iter().map(|e| e.ts).max().unwrap_or(0);
    now_ms().max(last + 1)
}

fn upsert(events: &mut Vec<Event>, event: Event) {
    match events.iter().position(|e| e.key() == event.key()) {
        Some(idx) => events[idx] = event,
        None => {
            let at = events.partition_point(|e| e.ts <= event.ts);
            events.insert(at, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::{Boundary, RestoreScope};

    fn seeded() -> (LocalEngine, mpsc::UnboundedReceiver<EnginePush>) {
        LocalEngine::new(vec![
            Event::user(5, "one"),
            Event::checkpoint(10, "AAA"),
            Event::user(15, "two"),
            Event::checkpoint(20, "BBB"),
            Event::assistant(25, "reply"),
        ])
    }

    fn request(ts: SeqTs, r: &str, scope: RestoreScope) -> RestoreRequest {
        RestoreRequest {
            timestamp: ts,
            snapshot_ref: r.into(),
            scope,
            mode: RestoreMode::Restore,
            boundary: Boundary::Including,
        }
    }

    #[tokio::test]
    async fn conversation_restore_truncates_and_pushes() {
        let (engine, mut rx) = seeded();
        let ack = engine
            .restore(request(10, "AAA", RestoreScope::ConversationOnly))
            .await
            .unwrap();
        assert_eq!(ack.generation, 1);
        assert_eq!(ack.log_len, 2);
        assert_eq!(ack.snapshot_ref, None);
        match rx.recv().await.unwrap() {
            EnginePush::LogReplaced {
                events,
                generation,
                truncating,
            } => {
                assert_eq!(events.len(), 2);
                assert_eq!(generation, 1);
                assert!(truncating);
            }
            other => panic!("unexpected push: {other:?}"),
        }
    }

    #[tokio::test]
    async fn code_restore_keeps_log_and_updates_snapshot() {
        let (engine, mut rx) = seeded();
        let ack = engine
            .restore(request(10, "AAA", RestoreScope::CodeOnly))
            .await
            .unwrap();
        assert_eq!(ack.snapshot_ref.as_deref(), Some("AAA"));
        assert_eq!(engine.current_snapshot().as_deref(), Some("AAA"));
        assert_eq!(
            rx.recv().await.unwrap(),
            EnginePush::SnapshotUpdated {
                snapshot_ref: "AAA".into()
            }
        );
        match rx.recv().await.unwrap() {
            EnginePush::LogReplaced {
                events, truncating, ..
            } => {
                assert_eq!(events.len(), 5);
                assert!(!truncating);
            }
            other => panic!("unexpected push: {other:?}"),
        }
    }

    #[tokio::test]
    async fn preview_mutates_nothing() {
        let (engine, mut rx) = seeded();
        let ack = engine
            .restore(request(20, "BBB", RestoreScope::Both).with_mode(RestoreMode::Preview))
            .await
            .unwrap();
        assert_eq!(ack.log_len, 4);
        assert_eq!(engine.events().len(), 5);
        assert_eq!(engine.current_snapshot().as_deref(), Some("BBB"));
        assert_eq!(engine.generation(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_checkpoint_rejected() {
        let (engine, _rx) = seeded();
        let err = engine
            .restore(request(20, "AAA", RestoreScope::Both))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CheckpointNotFound { ts: 20, .. }));

        let err = engine
            .restore(request(20, " ", RestoreScope::Both))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let (engine, _rx) = seeded();
        engine.fail_next_restore(EngineError::Workspace("disk full".into()));
        assert!(engine
            .restore(request(10, "AAA", RestoreScope::CodeOnly))
            .await
            .is_err());
        assert!(engine
            .restore(request(10, "AAA", RestoreScope::CodeOnly))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn create_checkpoint_appends_marker() {
        let (engine, mut rx) = seeded();
        let r = engine.create_checkpoint(false).await.unwrap();
        assert_eq!(r.len(), 40);
        let events = engine.events();
        let last = events.last().unwrap();
        assert!(last.ts > 25);
        assert_eq!(
            last.payload,
            Payload::CheckpointMarker {
                snapshot_ref: r.clone()
            }
        );
        assert!(!last.is_auto_saved());
        assert!(matches!(
            rx.recv().await.unwrap(),
            EnginePush::LogReplaced {
                truncating: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn exchange_adds_four_entries() {
        let (engine, _rx) = LocalEngine::new(vec![]);
        engine.simulate_exchange("fix the bug", "done", true);
        let events = engine.events();
        assert_eq!(events.len(), 4);
        assert!(events[3].is_auto_saved());
        assert!(engine.current_snapshot().is_some());
    }

    #[test]
    fn upsert_keeps_order() {
        let mut events = vec![Event::user(1, "a"), Event::user(3, "c")];
        upsert(&mut events, Event::user(2, "b"));
        upsert(&mut events, Event::user(3, "C"));
        let ts: Vec<_> = events.iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![1, 2, 3]);
        assert_eq!(events[2].payload.text(), Some("C"));

        upsert(&mut events, Event::checkpoint(3, "abc"));
        assert_eq!(events.len(), 4);
        assert_eq!(events[2].payload.text(), Some("C"));
    }
}
