use anyhow::{anyhow, Result};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Parses a cursor given either as Unix milliseconds or as an RFC 3339 timestamp.
pub fn parse_cursor_to_unix_ms(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("cursor value is empty"));
    }
    if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return trimmed
            .parse::<u64>()
            .map_err(|error| anyhow!("invalid millisecond cursor '{trimmed}': {error}"));
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(trimmed)
        .map_err(|error| anyhow!("invalid cursor '{trimmed}': {error}"))?;
    u64::try_from(parsed.timestamp_millis())
        .map_err(|_| anyhow!("cursor '{trimmed}' is before the Unix epoch"))
}
