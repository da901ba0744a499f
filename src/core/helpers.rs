use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;

use crate::config::{HashCost, TIMESTAMP_FORMAT};
use crate::core::errors::{Result, StoreError};

/// Current time truncated to whole milliseconds, the precision the data files keep.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drops everything below the millisecond.
pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn argon2(cost: HashCost) -> Result<Argon2<'static>> {
    let params = Params::new(cost.memory_kib, cost.iterations, Params::DEFAULT_P_COST, None)
        .map_err(|e| StoreError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str, cost: HashCost) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    argon2(cost)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    // Cost parameters come from the PHC string itself.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// True when `value` is a PHC-formatted hash rather than a legacy plaintext password.
pub fn is_password_hash(value: &str) -> bool {
    PasswordHash::new(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn timestamp_uses_file_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(format_timestamp(&ts), "2024-03-01T12:30:45.123+0000");
        assert_eq!(parse_timestamp("2024-03-01T12:30:45.123+0000"), Some(ts));
    }

    #[test]
    fn parse_normalizes_offsets_to_utc() {
        let ts = parse_timestamp("2024-03-01T07:30:45.123-0500").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-01T12:30:45.123+0000");
    }

    #[test]
    fn truncate_keeps_whole_milliseconds() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let truncated = truncate_millis(ts);
        assert_eq!(truncated.nanosecond(), 123_000_000);
        assert_eq!(truncate_millis(truncated), truncated);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-03-01 12:30:45"), None);
    }

    #[test]
    fn now_has_millisecond_precision() {
        let now = now_millis();
        assert_eq!(now.nanosecond() % 1_000_000, 0);
        assert_eq!(parse_timestamp(&format_timestamp(&now)), Some(now));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2", HashCost::cheap()).unwrap();
        assert!(is_password_hash(&hash));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!is_password_hash("hunter2"));
        assert!(!verify_password("hunter2", "hunter2"));
    }
}
