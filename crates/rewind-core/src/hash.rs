use sha2::{Digest, Sha256};

/// Length of a snapshot reference in hex characters.
pub const SNAPSHOT_REF_LEN: usize = 40;

/// Compute SHA-256 hash of bytes, returning lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Commit-like 40-character content reference.
pub fn snapshot_ref(bytes: &[u8]) -> String {
    let mut h = sha256_hex(bytes);
    h.truncate(SNAPSHOT_REF_LEN);
    h
}

/// Short display prefix of a snapshot reference.
pub fn short_ref(snapshot_ref: &str, chars: usize) -> &str {
    match snapshot_ref.char_indices().nth(chars) {
        Some((idx, _)) => &snapshot_ref[..idx],
        None => snapshot_ref,
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}
