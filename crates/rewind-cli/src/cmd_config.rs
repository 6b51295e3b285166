use clap::Subcommand;
use rewind_core::config::write_atomic;
use rewind_core::RewindConfig;
use serde_json::{Map, Value};
use std::path::Path;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. restore_timeout_ms)
        key: String,
        /// Config value (true/false/number)
        value: String,
    },
    /// Get the effective value of a key
    Get {
        /// Config key
        key: String,
    },
    /// List all effective config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(repo_root, &key, &value),
        ConfigCmd::Get { key } => get(repo_root, &key),
        ConfigCmd::List => list(repo_root),
    }
}

// ── Command Implementations ──

/// Raw keys stored in the file. Returns an empty map if the file doesn't exist.
fn read_raw(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<u64>() {
                Value::Number(n.into())
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

fn effective_values(config: &RewindConfig) -> anyhow::Result<Map<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("config did not serialize to an object"),
    }
}

/// Validate and store one key. Unknown keys and ill-typed values are refused.
fn set_at(path: &Path, key: &str, value: &str) -> anyhow::Result<Value> {
    let known = effective_values(&RewindConfig::default())?;
    if !known.contains_key(key) {
        let keys: Vec<&str> = known.keys().map(String::as_str).collect();
        anyhow::bail!("unknown config key '{key}' (known: {})", keys.join(", "));
    }

    let mut raw = read_raw(path)?;
    let parsed = parse_value(value);
    raw.insert(key.to_string(), parsed.clone());
    serde_json::from_value::<RewindConfig>(Value::Object(raw.clone()))
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))?;

    let json = serde_json::to_string_pretty(&raw)?;
    write_atomic(path, json.as_bytes())?;
    tracing::debug!(key, %parsed, path = %path.display(), "config updated");
    Ok(parsed)
}

/// `rewind config set <key> <value>`
pub fn set(repo_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let stored = set_at(&RewindConfig::path_in(repo_root), key, value)?;
    println!("{key} = {stored}");
    Ok(())
}

/// `rewind config get <key>`
pub fn get(repo_root: &Path, key: &str) -> anyhow::Result<()> {
    let values = effective_values(&RewindConfig::load(repo_root)?)?;
    match values.get(key) {
        Some(val) => println!("{val}"),
        None => anyhow::bail!("unknown config key '{key}'"),
    }
    Ok(())
}

/// `rewind config list`
pub fn list(repo_root: &Path) -> anyhow::Result<()> {
    let config = RewindConfig::load(repo_root)?;
    for (k, v) in &effective_values(&config)? {
        println!("{k} = {v}");
    }
    Ok(())
}
