//! JSONL transcript files: one [`Event`] per line.

use std::fs;
use std::path::Path;

use rewind_core::Event;

/// Read every event in a transcript file. Blank lines are skipped.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    parse_events(&content).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

pub fn parse_events(content: &str) -> anyhow::Result<Vec<Event>> {
    let mut events = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let ev: Event = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("line {}: {e}", idx + 1))?;
        events.push(ev);
    }
    Ok(events)
}

/// Replace the file with the given events, creating parent dirs if needed.
pub fn write_events(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let mut buf = String::new();
    for ev in events {
        buf.push_str(&serde_json::to_string(ev)?);
        buf.push('\n');
    }
    rewind_core::config::write_atomic(path, buf.as_bytes())
}
