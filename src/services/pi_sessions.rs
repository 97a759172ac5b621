use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Memoized pre-order payment-intent session. A retried client submission
/// carrying the same key resolves to the same provider intent instead of
/// creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiSession {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub cart_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Process-local TTL map of pre-order payment-intent sessions.
///
/// Reads take the lock shared; `put`, `delete`, and the sweeper take it
/// exclusively. A poisoned lock is recovered rather than propagated: no
/// critical section here can leave the map half-written. The store is intentionally not persisted: after a restart,
/// retried clients create fresh intents and the reconciler worker cancels
/// the orphans provider-side.
pub struct PiSessionStore {
    ttl: chrono::Duration,
    sessions: RwLock<HashMap<Uuid, PiSession>>,
}

impl PiSessionStore {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the session iff present and not yet expired.
    pub fn get(&self, key: &Uuid) -> Option<PiSession> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &Uuid, now: DateTime<Utc>) -> Option<PiSession> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(key)
            .filter(|session| now < session.expires_at)
            .cloned()
    }

    /// Stores a session under `key`, generating a fresh key when none is
    /// supplied. Overwrites any prior entry for the same key.
    pub fn put(
        &self,
        key: Option<Uuid>,
        payment_intent_id: String,
        client_secret: String,
        cart_fingerprint: String,
    ) -> Uuid {
        self.put_at(key, payment_intent_id, client_secret, cart_fingerprint, Utc::now())
    }

    fn put_at(
        &self,
        key: Option<Uuid>,
        payment_intent_id: String,
        client_secret: String,
        cart_fingerprint: String,
        now: DateTime<Utc>,
    ) -> Uuid {
        let key = key.unwrap_or_else(Uuid::new_v4);
        let session = PiSession {
            payment_intent_id,
            client_secret,
            cart_fingerprint,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, session);
        key
    }

    pub fn delete(&self, key: &Uuid) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Evicts expired entries; returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| now < session.expires_at);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the single-threaded background sweeper. Exits when the
    /// shutdown signal flips.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = store.sweep(Utc::now());
                        if evicted > 0 {
                            debug!(evicted, "swept expired payment-intent sessions");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("payment-intent session sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn store(ttl_secs: i64) -> PiSessionStore {
        PiSessionStore::new(ChronoDuration::seconds(ttl_secs))
    }

    #[test]
    fn put_then_get_returns_session_within_ttl() {
        let store = store(60);
        let key = store.put(
            None,
            "pi_123".into(),
            "secret_abc".into(),
            "fp_1".into(),
        );
        let session = store.get(&key).expect("session should be live");
        assert_eq!(session.payment_intent_id, "pi_123");
        assert_eq!(session.expires_at, session.created_at + ChronoDuration::seconds(60));
    }

    #[test]
    fn get_after_expiry_returns_nothing() {
        let store = store(60);
        let now = Utc::now();
        let key = store.put_at(None, "pi_1".into(), "cs".into(), "fp".into(), now);
        assert!(store.get_at(&key, now + ChronoDuration::seconds(61)).is_none());
        // Entry still occupies memory until a sweep.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_removes_entry() {
        let store = store(60);
        let key = store.put(None, "pi".into(), "cs".into(), "fp".into());
        assert!(store.delete(&key));
        assert!(store.get(&key).is_none());
        assert!(!store.delete(&key));
    }

    #[test]
    fn put_with_explicit_key_overwrites() {
        let store = store(60);
        let key = Uuid::new_v4();
        store.put(Some(key), "pi_a".into(), "cs_a".into(), "fp".into());
        store.put(Some(key), "pi_b".into(), "cs_b".into(), "fp".into());
        assert_eq!(store.get(&key).unwrap().payment_intent_id, "pi_b");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sweep_evicts_only_expired_entries() {
        let store = store(60);
        let now = Utc::now();
        store.put_at(None, "old".into(), "cs".into(), "fp".into(), now - ChronoDuration::seconds(120));
        let live = store.put_at(None, "new".into(), "cs".into(), "fp".into(), now);
        assert_eq!(store.sweep(now), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get_at(&live, now).is_some());
    }

    #[test]
    fn operations_survive_a_poisoned_lock() {
        let store = Arc::new(store(60));
        let key = store.put(None, "pi_1".into(), "cs".into(), "fp".into());

        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.sessions.write().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(store.sessions.is_poisoned());

        assert!(store.get(&key).is_some());
        assert!(store.delete(&key));
        assert_eq!(store.len(), 0);
        store.put(Some(key), "pi_2".into(), "cs".into(), "fp".into());
        assert_eq!(store.get(&key).unwrap().payment_intent_id, "pi_2");
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let store = Arc::new(store(60));
        let (tx, rx) = watch::channel(false);
        let handle = store.spawn_sweeper(Duration::from_millis(10), rx);
        tx.send(true).expect("send shutdown");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit promptly")
            .expect("sweeper should not panic");
    }
}
