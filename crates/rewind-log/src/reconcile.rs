//! Merge an authoritative event list into the locally-held log.
//!
//! Two failure modes are guarded against: stale content coming back after a
//! newer local observation, and a transcript that never shrinks after an
//! intentional rollback. Incremental pushes never delete; only a truncating
//! merge (one that follows a restore) may remove entries.

use std::collections::{HashMap, HashSet};

use rewind_core::{EntryKey, Event, EventKind, RewindError, SeqTs};

use crate::log::EventLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Regular push. Entries missing from the incoming list are kept.
    Incremental,
    /// Push following a restore. Entries missing from the incoming list are removed.
    Truncating,
}

/// An incoming entry that lost against newer local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleRejection {
    pub ts: SeqTs,
    pub kind: EventKind,
    pub incoming: usize,
    pub recorded: usize,
}

impl StaleRejection {
    pub fn as_error(&self) -> RewindError {
        RewindError::StaleMergeRejected {
            ts: self.ts,
            incoming: self.incoming,
            recorded: self.recorded,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub rejected: Vec<StaleRejection>,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.added + self.replaced + self.removed > 0
    }
}

enum Resolution {
    Replace,
    Reject { recorded: usize },
}

/// Owner of the local log. Tracks the highest version seen per `(ts, kind)`
/// key and the keys a truncating merge removed.
#[derive(Debug, Default)]
pub struct Reconciler {
    log: EventLog,
    versions: HashMap<EntryKey, usize>,
    tombstones: HashMap<EntryKey, usize>,
    stale_rejections: u64,
}

impl Reconciler {
    pub fn new(log: EventLog) -> Self {
        let mut versions = HashMap::new();
        for ev in log.events() {
            bump(&mut versions, ev.key(), ev.version());
        }
        Self {
            log,
            versions,
            tombstones: HashMap::new(),
            stale_rejections: 0,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn events(&self) -> &[Event] {
        self.log.events()
    }

    /// Highest version observed for `key`, from either side.
    pub fn recorded_version(&self, key: EntryKey) -> Option<usize> {
        self.versions.get(&key).copied()
    }

    /// Total rejections since creation.
    pub fn stale_rejections(&self) -> u64 {
        self.stale_rejections
    }

    /// Record an entry produced locally: an append, growth of a streaming
    /// entry, or its finalization.
    pub fn apply_local(&mut self, event: Event) {
        let key = event.key();
        self.tombstones.remove(&key);
        bump(&mut self.versions, key, event.version());
        self.log.upsert(event);
    }

    /// Merge an authoritative snapshot into the local log.
    pub fn merge(&mut self, incoming: Vec<Event>, mode: MergeMode) -> MergeReport {
        let mut report = MergeReport::default();
        let mut working = self.log.take_events();

        if mode == MergeMode::Truncating {
            let keep: HashSet<EntryKey> = incoming.iter().map(Event::key).collect();
            let before = working.len();
            working.retain(|ev| {
                let key = ev.key();
                if keep.contains(&key) {
                    return true;
                }
                let recorded = self.versions.remove(&key).unwrap_or(0);
                let tomb = self.tombstones.entry(key).or_insert(0);
                *tomb = (*tomb).max(recorded).max(ev.version());
                false
            });
            report.removed = before - working.len();
        }

        let mut index: HashMap<EntryKey, usize> = HashMap::new();
        for (i, ev) in working.iter().enumerate() {
            index.entry(ev.key()).or_insert(i);
        }

        for ev in incoming {
            let key = ev.key();
            let v_in = ev.version();
            let found = index.get(&key).copied();
            let Some(i) = found else {
                if mode == MergeMode::Incremental {
                    if let Some(&tomb) = self.tombstones.get(&key) {
                        if v_in <= tomb {
                            self.reject(&mut report, key, v_in, tomb);
                            continue;
                        }
                    }
                }
                self.tombstones.remove(&key);
                bump(&mut self.versions, key, v_in);
                index.insert(key, working.len());
                working.push(ev);
                report.added += 1;
                continue;
            };

            let recorded = self.versions.get(&key).copied().unwrap_or(0);
            match resolve(&working[i], &ev, recorded) {
                Resolution::Replace => {
                    if working[i] == ev {
                        report.unchanged += 1;
                    } else {
                        working[i] = ev;
                        report.replaced += 1;
                    }
                    bump(&mut self.versions, key, v_in);
                }
                Resolution::Reject { recorded } => {
                    self.reject(&mut report, key, v_in, recorded);
                }
            }
        }

        working.sort_by_key(|e| e.ts);
        let changed = report.changed();
        self.log.set_events(working, changed);

        tracing::debug!(
            mode = ?mode,
            added = report.added,
            replaced = report.replaced,
            unchanged = report.unchanged,
            removed = report.removed,
            rejected = report.rejected.len(),
            "merged authoritative log"
        );
        report
    }

    fn reject(
        &mut self,
        report: &mut MergeReport,
        key: EntryKey,
        incoming: usize,
        recorded: usize,
    ) {
        let (ts, kind) = key;
        let rejection = StaleRejection {
            ts,
            kind,
            incoming,
            recorded,
        };
        tracing::debug!(error = %rejection.as_error(), "stale entry dropped");
        self.stale_rejections += 1;
        report.rejected.push(rejection);
    }
}

fn resolve(local: &Event, incoming: &Event, recorded: usize) -> Resolution {
    let v_in = incoming.version();
    let v_local = local.version();
    match (local.partial, incoming.partial) {
        // A partial arriving after completion is stale unless it saw more content.
        (false, true) if v_in > recorded => Resolution::Replace,
        (false, true) => Resolution::Reject { recorded },
        // Never roll a streaming or finalized entry back to a shorter state.
        (true, _) | (false, false) if v_in >= v_local => Resolution::Replace,
        (true, _) | (false, false) => Resolution::Reject { recorded: v_local },
    }
}

fn bump(versions: &mut HashMap<EntryKey, usize>, key: EntryKey, version: usize) {
    let slot = versions.entry(key).or_insert(0);
    *slot = (*slot).max(version);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming(ts: SeqTs, len: usize) -> Event {
        Event::assistant(ts, "x".repeat(len)).with_partial(true)
    }

    fn done(ts: SeqTs, len: usize) -> Event {
        Event::assistant(ts, "x".repeat(len))
    }

    fn reply(r: &Reconciler, ts: SeqTs) -> &Event {
        r.log().get((ts, EventKind::AssistantMessage)).unwrap()
    }

    fn keys(r: &Reconciler) -> Vec<SeqTs> {
        r.events().iter().map(|e| e.ts).collect()
    }

    #[test]
    fn new_entries_are_added_in_order() {
        let mut r = Reconciler::default();
        let report = r.merge(
            vec![Event::user(20, "b"), Event::user(10, "a")],
            MergeMode::Incremental,
        );
        assert_eq!(report.added, 2);
        assert_eq!(keys(&r), vec![10, 20]);
        assert_eq!(r.log().revision(), 1);
    }

    #[test]
    fn stale_streaming_push_rejected_then_newer_accepted() {
        let mut r = Reconciler::default();
        r.apply_local(streaming(100, 12));

        let report = r.merge(vec![streaming(100, 8)], MergeMode::Incremental);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].incoming, 8);
        assert_eq!(reply(&r, 100).version(), 12);
        assert_eq!(r.stale_rejections(), 1);

        let report = r.merge(vec![streaming(100, 15)], MergeMode::Incremental);
        assert!(report.rejected.is_empty());
        assert_eq!(report.replaced, 1);
        assert_eq!(reply(&r, 100).version(), 15);
    }

    #[test]
    fn partial_after_finalization_is_rejected() {
        let mut r = Reconciler::default();
        r.apply_local(streaming(5, 10));
        r.apply_local(done(5, 10));

        let report = r.merge(vec![streaming(5, 10)], MergeMode::Incremental);
        assert_eq!(report.rejected.len(), 1);
        let ev = reply(&r, 5);
        assert!(!ev.partial);
        assert_eq!(
            report.rejected[0].as_error(),
            RewindError::StaleMergeRejected {
                ts: 5,
                incoming: 10,
                recorded: 10
            }
        );
    }

    #[test]
    fn partial_with_more_content_replaces_finalized() {
        let mut r = Reconciler::default();
        r.apply_local(done(5, 4));
        let report = r.merge(vec![streaming(5, 9)], MergeMode::Incremental);
        assert_eq!(report.replaced, 1);
        assert!(reply(&r, 5).partial);
    }

    #[test]
    fn finalized_entry_never_shortened() {
        let mut r = Reconciler::default();
        r.apply_local(done(5, 10));
        let report = r.merge(vec![done(5, 3)], MergeMode::Incremental);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(reply(&r, 5).version(), 10);
    }

    #[test]
    fn finalization_of_streaming_entry_accepted() {
        let mut r = Reconciler::default();
        r.apply_local(streaming(5, 10));
        r.merge(vec![done(5, 10)], MergeMode::Incremental);
        assert!(!r.log().has_partial());
    }

    #[test]
    fn incremental_merge_never_deletes() {
        let mut r = Reconciler::default();
        r.merge(
            vec![Event::user(1, "a"), Event::user(2, "b"), Event::user(3, "c")],
            MergeMode::Incremental,
        );
        let report = r.merge(vec![Event::user(2, "b")], MergeMode::Incremental);
        assert_eq!(report.removed, 0);
        assert_eq!(keys(&r), vec![1, 2, 3]);
    }

    #[test]
    fn truncating_merge_removes_exactly_omitted_entries() {
        let mut r = Reconciler::default();
        r.merge(
            vec![
                Event::user(1, "a"),
                Event::checkpoint(2, "AAA"),
                Event::user(3, "c"),
                Event::assistant(4, "d"),
            ],
            MergeMode::Incremental,
        );
        let report = r.merge(
            vec![Event::user(1, "a"), Event::checkpoint(2, "AAA")],
            MergeMode::Truncating,
        );
        assert_eq!(report.removed, 2);
        assert_eq!(report.unchanged, 2);
        assert_eq!(keys(&r), vec![1, 2]);
        assert_eq!(r.recorded_version((3, EventKind::UserMessage)), None);
    }

    #[test]
    fn removed_entries_not_resurrected_by_late_incremental_push() {
        let mut r = Reconciler::default();
        let full = vec![Event::user(1, "a"), Event::user(3, "late")];
        r.merge(full.clone(), MergeMode::Incremental);
        r.merge(vec![Event::user(1, "a")], MergeMode::Truncating);

        let report = r.merge(full, MergeMode::Incremental);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].ts, 3);
        assert_eq!(keys(&r), vec![1]);

        // New content at a fresh key still lands.
        r.merge(vec![Event::user(5, "new")], MergeMode::Incremental);
        assert_eq!(keys(&r), vec![1, 5]);
    }

    #[test]
    fn merging_same_snapshot_twice_is_idempotent() {
        let mut r = Reconciler::default();
        r.apply_local(streaming(30, 4));
        let snapshot = vec![
            Event::user(10, "hello"),
            Event::checkpoint(20, "AAA"),
            streaming(30, 6),
        ];
        r.merge(snapshot.clone(), MergeMode::Incremental);
        let first = r.events().to_vec();
        let rev = r.log().revision();

        let report = r.merge(snapshot, MergeMode::Incremental);
        assert_eq!(r.events(), first.as_slice());
        assert!(!report.changed());
        assert_eq!(report.unchanged, 3);
        assert_eq!(r.log().revision(), rev);
    }

    #[test]
    fn versions_never_decrease_under_any_ordering() {
        let pushes = [3usize, 9, 1, 7, 12, 5];
        let mut r = Reconciler::default();
        let mut high = 0;
        for len in pushes {
            r.merge(vec![streaming(1, len)], MergeMode::Incremental);
            let now = reply(&r, 1).version();
            assert!(now >= high);
            high = now;
        }
        assert_eq!(high, 12);
    }

    #[test]
    fn truncating_merge_accepts_previously_tombstoned_key() {
        let mut r = Reconciler::default();
        r.merge(vec![Event::user(1, "a"), Event::user(2, "b")], MergeMode::Incremental);
        r.merge(vec![Event::user(1, "a")], MergeMode::Truncating);
        let report = r.merge(
            vec![Event::user(1, "a"), Event::user(2, "b")],
            MergeMode::Truncating,
        );
        assert_eq!(report.added, 1);
        assert_eq!(keys(&r), vec![1, 2]);
    }

    #[test]
    fn local_append_clears_tombstone() {
        let mut r = Reconciler::default();
        r.merge(vec![Event::user(1, "a"), Event::user(2, "b")], MergeMode::Incremental);
        r.merge(vec![Event::user(1, "a")], MergeMode::Truncating);
        r.apply_local(Event::user(2, "b"));
        assert_eq!(keys(&r), vec![1, 2]);
        let report = r.merge(vec![Event::user(2, "b")], MergeMode::Incremental);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn entries_of_different_kinds_may_share_a_ts() {
        let mut r = Reconciler::default();
        let snapshot = vec![Event::user(10, "hello"), Event::checkpoint(10, "AAA")];
        let report = r.merge(snapshot.clone(), MergeMode::Incremental);
        assert_eq!(report.added, 2);
        assert!(report.rejected.is_empty());
        assert_eq!(r.events(), snapshot.as_slice());
        assert_eq!(rewind_core::ledger::checkpoint_count(r.events()), 1);

        let report = r.merge(snapshot, MergeMode::Incremental);
        assert_eq!(report.unchanged, 2);
        assert!(!report.changed());
    }

    #[test]
    fn truncation_removes_only_the_omitted_kind_at_a_shared_ts() {
        let mut r = Reconciler::default();
        r.merge(
            vec![Event::user(10, "hello"), Event::checkpoint(10, "AAA")],
            MergeMode::Incremental,
        );
        let report = r.merge(vec![Event::user(10, "hello")], MergeMode::Truncating);
        assert_eq!(report.removed, 1);
        assert_eq!(r.log().len(), 1);
        assert!(r.log().get((10, EventKind::CheckpointMarker)).is_none());

        let report = r.merge(vec![Event::checkpoint(10, "AAA")], MergeMode::Incremental);
        assert_eq!(report.rejected[0].kind, EventKind::CheckpointMarker);
        assert_eq!(r.log().len(), 1);
    }
}
