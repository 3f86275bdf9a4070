// crates/tracking-gate-server/src/session.rs
// ============================================================================
// Module: Session Registry
// Description: Per-caller role cache scopes with idle expiry and a size bound.
// Purpose: Hand each request its caller's own cache; never share across callers.
// Dependencies: tracking-gate-core, thiserror
// ============================================================================

//! ## Overview
//! The registry maps a [`CallerKey`] (a fingerprint of the caller's
//! credential) to that caller's [`RoleCache`]. Requests receive a shared
//! handle to their own scope and nothing else. Scopes idle for longer than
//! the auth-cache timeout are dropped, and the registry holds at most
//! `max_sessions` scopes, evicting the least recently used one first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracking_gate_core::CallerKey;
use tracking_gate_core::RoleCache;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Shared handle to one caller's role cache.
pub type RoleCacheHandle = Arc<Mutex<RoleCache>>;

/// Session registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A registry or cache lock was poisoned by a panicking holder.
    #[error("session state poisoned")]
    Poisoned,
}

/// One caller's cache scope.
#[derive(Debug)]
struct SessionEntry {
    /// Role cache for the caller.
    cache: RoleCacheHandle,
    /// Last time a request used the scope.
    last_seen: Instant,
}

/// Registry of per-caller role cache scopes.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Scopes keyed by caller.
    sessions: Mutex<HashMap<CallerKey, SessionEntry>>,
    /// Role entry lifetime inside each cache.
    cache_timeout: Duration,
    /// Idle lifetime of a scope.
    idle_timeout: Duration,
    /// Maximum number of live scopes.
    max_sessions: usize,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(cache_timeout: Duration, idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            cache_timeout,
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Locks the registry map.
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CallerKey, SessionEntry>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::Poisoned)
    }

    /// Returns the caller's cache scope, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] when the registry lock is poisoned.
    pub fn scope(&self, caller: &CallerKey, now: Instant) -> Result<RoleCacheHandle, SessionError> {
        let mut sessions = self.lock()?;
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < idle_timeout);
        if let Some(entry) = sessions.get_mut(caller) {
            entry.last_seen = now;
            return Ok(Arc::clone(&entry.cache));
        }
        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
            }
        }
        let cache = Arc::new(Mutex::new(RoleCache::new(self.cache_timeout)));
        sessions.insert(
            caller.clone(),
            SessionEntry {
                cache: Arc::clone(&cache),
                last_seen: now,
            },
        );
        drop(sessions);
        Ok(cache)
    }

    /// Drops the caller's scope (logout). Returns true when a scope existed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] when the registry lock is poisoned.
    pub fn clear(&self, caller: &CallerKey) -> Result<bool, SessionError> {
        let removed = self.lock()?.remove(caller);
        let Some(entry) = removed else {
            return Ok(false);
        };
        entry.cache.lock().map_err(|_| SessionError::Poisoned)?.clear();
        Ok(true)
    }

    /// Returns the number of live scopes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] when the registry lock is poisoned.
    pub fn session_count(&self) -> Result<usize, SessionError> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]
mod tests {
    use tracking_gate_core::ProjectPath;
    use tracking_gate_core::Role;

    use super::*;

    fn registry(max_sessions: usize) -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(300), Duration::from_secs(60), max_sessions)
    }

    #[test]
    fn callers_never_share_a_scope() {
        let sessions = registry(10);
        let now = Instant::now();
        let alice = CallerKey::new("alice");
        let bob = CallerKey::new("bob");
        let path = ProjectPath::parse("teams/alpha").unwrap();
        let alice_scope = sessions.scope(&alice, now).unwrap();
        alice_scope.lock().unwrap().set(path.clone(), Role::Owner, now);
        let again = sessions.scope(&alice, now).unwrap();
        assert_eq!(again.lock().unwrap().get(&path, now), Some(Role::Owner));
        let bob_scope = sessions.scope(&bob, now).unwrap();
        assert_eq!(bob_scope.lock().unwrap().get(&path, now), None);
    }

    #[test]
    fn idle_scopes_expire() {
        let sessions = registry(10);
        let start = Instant::now();
        let alice = CallerKey::new("alice");
        let first = sessions.scope(&alice, start).unwrap();
        let later = start + Duration::from_secs(61);
        let second = sessions.scope(&alice, later).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let sessions = registry(2);
        let start = Instant::now();
        let alice = CallerKey::new("alice");
        let bob = CallerKey::new("bob");
        let carol = CallerKey::new("carol");
        let alice_scope = sessions.scope(&alice, start).unwrap();
        sessions.scope(&bob, start + Duration::from_secs(1)).unwrap();
        sessions.scope(&carol, start + Duration::from_secs(2)).unwrap();
        assert_eq!(sessions.session_count().unwrap(), 2);
        let again = sessions.scope(&alice, start + Duration::from_secs(3)).unwrap();
        assert!(!Arc::ptr_eq(&alice_scope, &again));
    }

    #[test]
    fn clear_drops_the_scope() {
        let sessions = registry(10);
        let now = Instant::now();
        let alice = CallerKey::new("alice");
        sessions.scope(&alice, now).unwrap();
        assert!(sessions.clear(&alice).unwrap());
        assert!(!sessions.clear(&alice).unwrap());
        assert_eq!(sessions.session_count().unwrap(), 0);
    }
}
