use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

pub const MAX_REPORTS_PER_HOUR: usize = 10;

/// Check rate limit for an IP. Returns true if the request is allowed, false
/// if rate-limited. Prunes expired entries and records the new request if
/// allowed.
pub fn check_rate_limit(entries: &mut Vec<Instant>, now: Instant, max_per_hour: usize) -> bool {
    let cutoff = now - Duration::from_secs(3600);
    entries.retain(|t| *t > cutoff);
    if entries.len() >= max_per_hour {
        return false;
    }
    entries.push(now);
    true
}

/// Prune empty entries from the rate limiter HashMap to prevent unbounded
/// growth.
pub fn prune_empty_entries(limiter: &mut HashMap<IpAddr, Vec<Instant>>) {
    let cutoff = Instant::now() - Duration::from_secs(3600);
    limiter.retain(|_, entries| {
        entries.retain(|t| *t > cutoff);
        !entries.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_under_limit() {
        let mut entries = Vec::new();
        let now = Instant::now();
        for _ in 0..9 {
            assert!(check_rate_limit(&mut entries, now, 10));
        }
        assert_eq!(entries.len(), 9);
    }

    #[test]
    fn allows_exactly_at_limit() {
        let mut entries = Vec::new();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(check_rate_limit(&mut entries, now, 10));
        }
        assert_eq!(entries.len(), 10);
    }

    #[test]
    fn rejects_over_limit() {
        let mut entries = Vec::new();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(check_rate_limit(&mut entries, now, 10));
        }
        // 11th should be rejected
        assert!(!check_rate_limit(&mut entries, now, 10));
        // entries should not grow past 10
        assert_eq!(entries.len(), 10);
    }

    #[test]
    fn expires_old_entries() {
        let mut entries = Vec::new();
        let old = Instant::now() - Duration::from_secs(3601);
        for _ in 0..10 {
            entries.push(old);
        }
        // New request should be allowed because old ones expired
        let now = Instant::now();
        assert!(check_rate_limit(&mut entries, now, 10));
        assert_eq!(entries.len(), 1);
    }
}
