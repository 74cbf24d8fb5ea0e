//! Platform id helpers.

/// Milliseconds between the UNIX epoch and the platform epoch (2015-01-01).
const PLATFORM_EPOCH_MS: i64 = 1_420_070_400_000;

/// Whether `s` looks like a platform id: 17 to 20 ASCII digits.
pub fn is_snowflake(s: &str) -> bool {
    (17..=20).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Creation time encoded in an id, in ms since the UNIX epoch.
pub fn timestamp_ms(id: &str) -> Option<i64> {
    let raw: u64 = id.parse().ok()?;
    let since_epoch = i64::try_from(raw >> 22).ok()?;
    Some(since_epoch + PLATFORM_EPOCH_MS)
}
