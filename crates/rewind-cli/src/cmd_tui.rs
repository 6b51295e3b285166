use std::path::Path;

use rewind_core::RewindConfig;

/// Launch the interactive session.
///
/// With the `tui` feature (default): opens the ratatui interface.
/// Without: prints the checkpoint ledger and exits.
pub fn execute(repo_root: &Path, log: Option<&Path>, export: Option<&Path>) -> anyhow::Result<()> {
    let config = RewindConfig::load(repo_root)?;
    let events = match log {
        Some(path) => rewind_log::jsonl::read_events(path)?,
        None => Vec::new(),
    };
    tracing::info!(
        events = events.len(),
        timeout_ms = config.restore_timeout_ms,
        "starting session"
    );

    #[cfg(feature = "tui")]
    {
        crate::tui::run(config, events, export)
    }

    #[cfg(not(feature = "tui"))]
    {
        let _ = export;
        eprintln!("rewind tui (plain mode: rebuild with the `tui` feature for the interactive UI)");
        crate::cmd_checkpoints::print_table(&config, &events);
        Ok(())
    }
}
