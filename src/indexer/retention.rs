//! Pure expiry arithmetic for the retention janitor. Takes `now` as an
//! explicit argument so the decision itself stays deterministic under
//! test, with the wall-clock read isolated to `now_epoch_secs`.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Whether a project last touched at `last_access_secs` has sat idle past
/// `expiry_hours` as of `now_secs`.
pub fn is_expired(now_secs: u64, last_access_secs: u64, expiry_hours: u64) -> bool {
    let expiry_secs = expiry_hours.saturating_mul(3600);
    now_secs.saturating_sub(last_access_secs) >= expiry_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_project_is_not_expired() {
        assert!(!is_expired(1_000, 999, 72));
    }

    #[test]
    fn project_past_the_window_is_expired() {
        let expiry_secs = 72 * 3600;
        assert!(is_expired(expiry_secs + 1_000, 1_000, 72));
    }

    #[test]
    fn exactly_at_the_boundary_is_expired() {
        let expiry_secs = 72 * 3600;
        assert!(is_expired(expiry_secs, 0, 72));
    }

    #[test]
    fn zero_expiry_hours_expires_immediately() {
        assert!(is_expired(100, 100, 0));
    }
}
