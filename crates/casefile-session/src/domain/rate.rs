//! Per-session turn rate gate.

use casefile_core::error::DomainError;
use chrono::{DateTime, Utc};

/// Minimum spacing, in milliseconds, between consecutive accepted turns of
/// one session.
pub const TURN_COOLDOWN_MS: i64 = 1500;

/// Rejects a turn arriving less than [`TURN_COOLDOWN_MS`] after the session's
/// latest persisted message.
///
/// # Errors
///
/// Returns `DomainError::RateLimited` carrying the remaining wait.
pub fn ensure_turn_allowed(
    last_message_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let Some(last) = last_message_at else {
        return Ok(());
    };
    let elapsed = (now - last).num_milliseconds();
    if elapsed >= TURN_COOLDOWN_MS {
        return Ok(());
    }
    Err(DomainError::RateLimited {
        retry_after_ms: TURN_COOLDOWN_MS - elapsed,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_first_turn_is_always_allowed() {
        assert!(ensure_turn_allowed(None, at(0)).is_ok());
    }

    #[test]
    fn test_turn_inside_cooldown_is_rate_limited() {
        let result = ensure_turn_allowed(Some(at(0)), at(1_000));

        match result {
            Err(DomainError::RateLimited { retry_after_ms }) => assert_eq!(retry_after_ms, 500),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_turn_at_cooldown_boundary_is_allowed() {
        assert!(ensure_turn_allowed(Some(at(0)), at(1_500)).is_ok());
    }
}
