//! Upstream credential pool with role-based selection, round-robin
//! rotation, and lazy throttle expiry.
//!
//! The pool is the one piece of state that an eventual concurrent caller
//! could touch, so the record table sits behind a mutex and the rotation
//! cursor is a monotonic atomic: a throttle check and the acquire that
//! depends on it happen under a single lock, never as check-then-use
//! across a gap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::errors::AgentError;

/// Default quarantine when the upstream reply carries no retry hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// What a credential is good for. `Completion` entries form the
/// round-robin rotation group; the other roles are dedicated slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dedicated key for speech synthesis traffic.
    Voice,
    /// Dedicated high-bandwidth key for vision-heavy calls.
    Vision,
    /// General-purpose keys, rotated to spread load.
    Completion,
}

/// One upstream credential. Owned exclusively by the pool; nothing outside
/// observes or stores the raw value beyond the single call using it.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    role: Role,
    value: String,
    rate_limited_until: Option<Instant>,
}

impl CredentialRecord {
    pub fn new(role: Role, value: impl Into<String>) -> Self {
        Self {
            role,
            value: value.into(),
            rate_limited_until: None,
        }
    }

    fn available(&self, now: Instant) -> bool {
        match self.rate_limited_until {
            Some(until) => now >= until,
            None => true,
        }
    }
}

#[derive(Debug)]
pub struct CredentialPool {
    records: Mutex<Vec<CredentialRecord>>,
    // Monotonic; advances modulo the rotation group size on every
    // completion acquire and is never reset between tasks.
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool from explicit records. An empty pool is a fatal
    /// configuration error, surfaced here rather than at first use.
    pub fn new(records: Vec<CredentialRecord>) -> Result<Self, AgentError> {
        if records.is_empty() {
            return Err(AgentError::Configuration(
                "no upstream credentials configured".into(),
            ));
        }
        info!("credential pool loaded with {} key(s)", records.len());
        Ok(Self {
            records: Mutex::new(records),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build the pool from the conventional environment keys, in stable
    /// insertion order: voice, vision, then the completion rotation group.
    pub fn from_env() -> Result<Self, AgentError> {
        let mut records = Vec::new();
        if let Ok(v) = std::env::var("GOOGLE_API_KEY_VOICE") {
            records.push(CredentialRecord::new(Role::Voice, v));
        }
        if let Ok(v) = std::env::var("GOOGLE_API_KEY_FLASH") {
            records.push(CredentialRecord::new(Role::Vision, v));
        }
        for key in ["GOOGLE_API_KEY_1", "GOOGLE_API_KEY_2", "GOOGLE_API_KEY_3"] {
            if let Ok(v) = std::env::var(key) {
                records.push(CredentialRecord::new(Role::Completion, v));
            }
        }
        Self::new(records)
    }

    /// Hand out a credential for `role`.
    ///
    /// Dedicated roles return their single key when it is not throttled.
    /// `Completion` rotates among currently-available group members. When
    /// the preferred role is exhausted the whole pool is scanned in
    /// insertion order and the first available key of any role wins.
    pub fn acquire(&self, role: Role) -> Result<String, AgentError> {
        let records = self.records.lock().expect("credential pool poisoned");
        let now = Instant::now();

        match role {
            Role::Completion => {
                let group: Vec<usize> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.role == Role::Completion)
                    .map(|(i, _)| i)
                    .collect();
                if !group.is_empty() {
                    let start = self.cursor.fetch_add(1, Ordering::Relaxed);
                    for step in 0..group.len() {
                        let idx = group[(start + step) % group.len()];
                        if records[idx].available(now) {
                            return Ok(records[idx].value.clone());
                        }
                    }
                }
            }
            dedicated => {
                if let Some(r) = records
                    .iter()
                    .find(|r| r.role == dedicated && r.available(now))
                {
                    return Ok(r.value.clone());
                }
            }
        }

        // Preferred role exhausted: first available key of any role.
        if let Some(r) = records.iter().find(|r| r.available(now)) {
            warn!("role {:?} fully throttled, falling back to {:?}", role, r.role);
            return Ok(r.value.clone());
        }

        Err(AgentError::NoCredential(
            "all upstream credentials are rate limited".into(),
        ))
    }

    /// Quarantine a credential until `now + retry_after` (60 s when the
    /// caller has no hint). Availability is re-derived lazily on the next
    /// check; there is no background timer.
    pub fn report_throttled(&self, value: &str, retry_after: Option<Duration>) {
        let delay = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
        let mut records = self.records.lock().expect("credential pool poisoned");
        if let Some(r) = records.iter_mut().find(|r| r.value == value) {
            r.rate_limited_until = Some(Instant::now() + delay);
            warn!("credential marked rate limited for {:.1}s", delay.as_secs_f64());
        }
    }

    /// Whether a credential is currently usable, judged against the clock
    /// at call time.
    pub fn is_available(&self, value: &str) -> bool {
        let records = self.records.lock().expect("credential pool poisoned");
        let now = Instant::now();
        records
            .iter()
            .find(|r| r.value == value)
            .map(|r| r.available(now))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation_pool() -> CredentialPool {
        CredentialPool::new(vec![
            CredentialRecord::new(Role::Vision, "flash-key"),
            CredentialRecord::new(Role::Completion, "key-a"),
            CredentialRecord::new(Role::Completion, "key-b"),
            CredentialRecord::new(Role::Completion, "key-c"),
        ])
        .unwrap()
    }

    #[test]
    fn empty_pool_is_a_configuration_error() {
        let err = CredentialPool::new(Vec::new()).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn dedicated_role_returns_its_key() {
        let pool = rotation_pool();
        assert_eq!(pool.acquire(Role::Vision).unwrap(), "flash-key");
        // No interference with the rotation cursor.
        assert_eq!(pool.acquire(Role::Completion).unwrap(), "key-a");
    }

    #[test]
    fn completion_rotation_is_cyclic_and_stable() {
        let pool = rotation_pool();
        let first: Vec<String> = (0..3).map(|_| pool.acquire(Role::Completion).unwrap()).collect();
        assert_eq!(first, ["key-a", "key-b", "key-c"]);
        // Cursor keeps advancing across "tasks"; order stays stable.
        let second: Vec<String> = (0..3).map(|_| pool.acquire(Role::Completion).unwrap()).collect();
        assert_eq!(second, ["key-a", "key-b", "key-c"]);
    }

    #[test]
    fn rotation_skips_throttled_members() {
        let pool = rotation_pool();
        pool.report_throttled("key-a", Some(Duration::from_secs(120)));
        assert_eq!(pool.acquire(Role::Completion).unwrap(), "key-b");
        assert_eq!(pool.acquire(Role::Completion).unwrap(), "key-b");
        assert_eq!(pool.acquire(Role::Completion).unwrap(), "key-c");
    }

    #[test]
    fn zero_retry_after_is_immediately_available() {
        let pool = rotation_pool();
        pool.report_throttled("key-a", Some(Duration::ZERO));
        assert!(pool.is_available("key-a"));
    }

    #[test]
    fn default_quarantine_blocks_the_key() {
        let pool = rotation_pool();
        assert!(pool.is_available("key-b"));
        pool.report_throttled("key-b", None);
        assert!(!pool.is_available("key-b"));
    }

    #[test]
    fn exhausted_role_falls_back_to_any_available_key() {
        let pool = rotation_pool();
        for key in ["key-a", "key-b", "key-c"] {
            pool.report_throttled(key, Some(Duration::from_secs(120)));
        }
        assert_eq!(pool.acquire(Role::Completion).unwrap(), "flash-key");
    }

    #[test]
    fn fully_throttled_pool_reports_no_credential() {
        let pool = rotation_pool();
        for key in ["flash-key", "key-a", "key-b", "key-c"] {
            pool.report_throttled(key, Some(Duration::from_secs(120)));
        }
        assert!(matches!(
            pool.acquire(Role::Completion),
            Err(AgentError::NoCredential(_))
        ));
    }

    #[test]
    fn unknown_credential_is_not_available() {
        let pool = rotation_pool();
        assert!(!pool.is_available("no-such-key"));
    }
}
