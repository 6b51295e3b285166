use rewind_core::{EntryKey, Event, SeqTs};

/// The transcript as observed locally, kept in `ts` order.
///
/// Mutated only through [`crate::Reconciler`]; everything else reads.
/// `revision` bumps on every change so derived views can memoize.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
    revision: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.ts);
        Self {
            events,
            revision: 0,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, key: EntryKey) -> Option<&Event> {
        self.events.iter().find(|e| e.key() == key)
    }

    /// Every entry recorded at `ts`, of any kind.
    pub fn at(&self, ts: SeqTs) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.ts == ts)
    }

    /// True while any entry is still streaming.
    pub fn has_partial(&self) -> bool {
        self.events.iter().any(|e| e.partial)
    }

    pub fn last_ts(&self) -> Option<SeqTs> {
        self.events.last().map(|e| e.ts)
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn set_events(&mut self, events: Vec<Event>, changed: bool) {
        self.events = events;
        if changed {
            self.revision += 1;
        }
    }

    /// Insert or replace by `(ts, kind)`, keeping `ts` order.
    pub(crate) fn upsert(&mut self, event: Event) {
        let key = event.key();
        match self.events.iter().position(|e| e.key() == key) {
            Some(idx) => self.events[idx] = event,
            None => {
                let at = self.events.partition_point(|e| e.ts <= event.ts);
                self.events.insert(at, event);
            }
        }
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::EventKind;

    #[test]
    fn from_events_sorts_by_ts() {
        let log = EventLog::from_events(vec![Event::user(20, "b"), Event::user(10, "a")]);
        let ts: Vec<_> = log.events().iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![10, 20]);
        assert_eq!(log.revision(), 0);
        assert_eq!(log.last_ts(), Some(20));
    }

    #[test]
    fn upsert_inserts_in_order_and_bumps_revision() {
        let mut log = EventLog::from_events(vec![Event::user(10, "a"), Event::user(30, "c")]);
        log.upsert(Event::user(20, "b"));
        let ts: Vec<_> = log.events().iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![10, 20, 30]);
        assert_eq!(log.revision(), 1);
    }

    #[test]
    fn upsert_replaces_existing_key() {
        let mut log = EventLog::from_events(vec![Event::assistant(10, "a").with_partial(true)]);
        assert!(log.has_partial());
        log.upsert(Event::assistant(10, "abc"));
        assert_eq!(log.len(), 1);
        assert!(!log.has_partial());
        let key = (10, EventKind::AssistantMessage);
        assert_eq!(log.get(key).unwrap().version(), 3);
    }

    #[test]
    fn upsert_keeps_other_kinds_at_same_ts() {
        let mut log = EventLog::from_events(vec![Event::user(10, "go")]);
        log.upsert(Event::checkpoint(10, "AAA"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.at(10).count(), 2);
        assert!(log.get((10, EventKind::CheckpointMarker)).is_some());
        assert_eq!(log.get((10, EventKind::UserMessage)).unwrap().version(), 2);
    }
}
