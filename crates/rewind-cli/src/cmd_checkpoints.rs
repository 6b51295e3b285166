use std::path::Path;

use rewind_core::hash::{now_ms, short_ref};
use rewind_core::ledger::derive_checkpoints;
use rewind_core::{CheckpointRecord, Event, RewindConfig};
use rewind_session::view::format_age;

/// `rewind checkpoints --log <FILE> [--json]`
pub fn execute(repo_root: &Path, log: &Path, json: bool) -> anyhow::Result<()> {
    let config = RewindConfig::load(repo_root)?;
    let events = rewind_log::jsonl::read_events(log)?;

    if json {
        let records = derive_checkpoints(&events, config.preview_chars);
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_table(&config, &events);
    }
    Ok(())
}

pub fn print_table(config: &RewindConfig, events: &[Event]) {
    let records = derive_checkpoints(events, config.preview_chars);
    if records.is_empty() {
        println!("(no checkpoints)");
        return;
    }
    for line in format_rows(&records, config.snapshot_prefix_chars, now_ms()) {
        println!("{line}");
    }
}

fn format_rows(records: &[CheckpointRecord], prefix_chars: usize, now: u64) -> Vec<String> {
    records
        .iter()
        .map(|cp| {
            let tag = if cp.is_auto_saved { "auto" } else { "    " };
            let age = format_age(now.saturating_sub(cp.ts));
            let preview = cp.preview.as_deref().unwrap_or("(no message)");
            format!(
                "{}  {tag}  {age:<10} {preview}",
                short_ref(&cp.snapshot_ref, prefix_chars)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::META_AUTO_SAVED;

    #[test]
    fn rows_show_prefix_age_and_preview() {
        let events = vec![
            Event::user(1_000, "rename the module"),
            Event::checkpoint(2_000, "abcdef0123456789").with_meta(META_AUTO_SAVED, true.into()),
        ];
        let records = derive_checkpoints(&events, 60);
        let rows = format_rows(&records, 8, 2_000 + 5 * 60_000);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("abcdef01  auto  5m ago"), "got: {}", rows[0]);
        assert!(rows[0].ends_with("rename the module"));
    }

    #[test]
    fn execute_reads_transcript_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("session.jsonl");
        rewind_log::jsonl::write_events(
            &log,
            &[Event::user(1, "hi"), Event::checkpoint(2, "a".repeat(40))],
        )
        .unwrap();
        execute(tmp.path(), &log, true).unwrap();
        execute(tmp.path(), &log, false).unwrap();
    }

    #[test]
    fn execute_missing_transcript_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(execute(tmp.path(), &tmp.path().join("nope.jsonl"), false).is_err());
    }
}
