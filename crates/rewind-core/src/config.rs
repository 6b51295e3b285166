//! Session configuration.
//!
//! Layering: built-in defaults, then `.rewind/config.json`, then environment
//! overrides. A missing file yields defaults; unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".rewind";
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_DOUBLE_PRESS_MS: &str = "REWIND_DOUBLE_PRESS_MS";
pub const ENV_RESTORE_TIMEOUT_MS: &str = "REWIND_RESTORE_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewindConfig {
    pub double_press_window_ms: u64,
    pub restore_timeout_ms: u64,
    pub visible_rows: usize,
    pub preview_chars: usize,
    pub snapshot_prefix_chars: usize,
    pub auto_checkpoint: bool,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            double_press_window_ms: 500,
            restore_timeout_ms: 5000,
            visible_rows: 10,
            preview_chars: crate::ledger::DEFAULT_PREVIEW_CHARS,
            snapshot_prefix_chars: 8,
            auto_checkpoint: true,
        }
    }
}

impl RewindConfig {
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load `{root}/.rewind/config.json` and apply environment overrides.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load_file(&Self::path_in(root))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Unparsable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ms) = lookup(ENV_DOUBLE_PRESS_MS).and_then(|v| v.parse().ok()) {
            self.double_press_window_ms = ms;
        }
        if let Some(ms) = lookup(ENV_RESTORE_TIMEOUT_MS).and_then(|v| v.parse().ok()) {
            self.restore_timeout_ms = ms;
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }
}

/// Write `data` to `path` via a temp file in the same directory.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RewindConfig::load_file(&RewindConfig::path_in(dir.path())).unwrap();
        assert_eq!(config, RewindConfig::default());
        assert_eq!(config.double_press_window_ms, 500);
        assert_eq!(config.visible_rows, 10);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = RewindConfig::path_in(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"restore_timeout_ms": 1200, "unknown": 1}"#).unwrap();
        let config = RewindConfig::load_file(&path).unwrap();
        assert_eq!(config.restore_timeout_ms, 1200);
        assert_eq!(config.double_press_window_ms, 500);
    }

    #[test]
    fn invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(RewindConfig::load_file(&path).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = RewindConfig::path_in(dir.path());
        let config = RewindConfig {
            visible_rows: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(RewindConfig::load_file(&path).unwrap().visible_rows, 4);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RewindConfig::default();
        config.apply_env(|key| match key {
            ENV_DOUBLE_PRESS_MS => Some("300".into()),
            ENV_RESTORE_TIMEOUT_MS => Some("nope".into()),
            _ => None,
        });
        assert_eq!(config.double_press_window_ms, 300);
        assert_eq!(config.restore_timeout_ms, 5000);
    }
}
