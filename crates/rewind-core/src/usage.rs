use serde::{Deserialize, Serialize};

use crate::types::{Boundary, Event, Payload, SeqTs};

/// Aggregated usage over a range of `cost_accounting` entries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageSummary {
    pub requests: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cache_writes: u64,
    pub cache_reads: u64,
    pub cost_usd: f64,
}

impl UsageSummary {
    pub fn is_empty(&self) -> bool {
        self.requests == 0
    }

    fn add(&mut self, ev: &Event) {
        if let Payload::CostAccounting(m) = &ev.payload {
            self.requests += 1;
            self.tokens_in += m.tokens_in;
            self.tokens_out += m.tokens_out;
            self.cache_writes += m.cache_writes;
            self.cache_reads += m.cache_reads;
            self.cost_usd += m.cost_usd;
        }
    }
}

/// Usage recorded in the entries a conversation restore at `marker_ts` discards.
pub fn discarded_usage(events: &[Event], marker_ts: SeqTs, boundary: Boundary) -> UsageSummary {
    let mut summary = UsageSummary::default();
    for ev in events.iter().filter(|e| !boundary.keeps(e.ts, marker_ts)) {
        summary.add(ev);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CostMetrics;

    fn cost(ts: SeqTs, tokens_in: u64, cost_usd: f64) -> Event {
        Event::cost(
            ts,
            CostMetrics {
                tokens_in,
                tokens_out: 1,
                cost_usd,
                ..Default::default()
            },
        )
    }

    #[test]
    fn sums_only_discarded_range() {
        let events = vec![
            cost(5, 100, 0.1),
            Event::checkpoint(10, "AAA"),
            cost(15, 200, 0.2),
            cost(25, 300, 0.3),
        ];
        let s = discarded_usage(&events, 10, Boundary::Including);
        assert_eq!(s.requests, 2);
        assert_eq!(s.tokens_in, 500);
        assert_eq!(s.tokens_out, 2);
        assert!((s.cost_usd - 0.5).abs() < 1e-9);
    }

    #[test]
    fn before_boundary_includes_marker_timestamp() {
        let events = vec![cost(10, 7, 0.0), Event::checkpoint(10, "AAA")];
        assert_eq!(discarded_usage(&events, 10, Boundary::Before).requests, 1);
        assert!(discarded_usage(&events, 10, Boundary::Including).is_empty());
    }
}
