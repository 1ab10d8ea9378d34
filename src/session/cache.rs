use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use super::{host_port_key, Session};
use crate::config::{Config, DEFAULT_SESSION_CACHE_SIZE, DEFAULT_SESSION_TIMEOUT};
use crate::message::SessionId;
use crate::Error;

/// Sessions shared by all connections of a client, keyed by session id and
/// by `host:port`.
///
/// Expiry is lazy. A lookup that finds a session older than the timeout
/// invalidates it and removes it. When the cache is full, an insert evicts
/// the least recently used entry.
///
/// Safe to share between threads. Lookups only take the read lock unless
/// they find something to remove.
#[derive(Debug)]
pub struct SessionCache {
    inner: RwLock<Inner>,
    clock: AtomicU64,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    timeout: Duration,
    by_id: HashMap<SessionId, Entry>,
    by_host: HashMap<String, SessionId>,
}

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    last_used: AtomicU64,
}

impl Default for SessionCache {
    fn default() -> Self {
        SessionCache::new(DEFAULT_SESSION_CACHE_SIZE, DEFAULT_SESSION_TIMEOUT)
    }
}

impl SessionCache {
    /// Create a cache. A capacity of 0 is unbounded and a zero timeout
    /// never expires.
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        SessionCache {
            inner: RwLock::new(Inner {
                capacity,
                timeout,
                by_id: HashMap::new(),
                by_host: HashMap::new(),
            }),
            clock: AtomicU64::new(0),
        }
    }

    /// Create a cache from signed values, rejecting negative ones.
    pub fn try_new(capacity: i64, timeout_secs: i64) -> Result<Self, Error> {
        Ok(SessionCache::new(
            checked_size(capacity)?,
            Duration::from_secs(checked_timeout(timeout_secs)?),
        ))
    }

    /// Cache sized by [`Config::session_cache_size`] and
    /// [`Config::session_timeout`].
    pub fn from_config(config: &Config) -> Self {
        SessionCache::new(config.session_cache_size(), config.session_timeout())
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.get_at(id, SystemTime::now())
    }

    pub fn get_at(&self, id: &SessionId, now: SystemTime) -> Option<Arc<Session>> {
        {
            let inner = self.read();
            let entry = inner.by_id.get(id)?;
            if entry.session.is_rejoinable() && !entry.session.is_expired(inner.timeout, now) {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                return Some(entry.session.clone());
            }
        }

        self.remove_stale(id, now)
    }

    /// Second half of a lookup that found a stale entry. The entry is looked
    /// at again under the write lock, since a fresh session may have been put
    /// under the same id in between.
    fn remove_stale(&self, id: &SessionId, now: SystemTime) -> Option<Arc<Session>> {
        let mut inner = self.write();
        let entry = inner.by_id.get(id)?;
        let session = &entry.session;

        if session.is_rejoinable() && !session.is_expired(inner.timeout, now) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return Some(session.clone());
        }
        if session.is_expired(inner.timeout, now) {
            debug!("Session {} expired", id);
            session.invalidate();
        }
        inner.remove(id);
        None
    }

    /// Look up the session last cached for a peer.
    pub fn get_by_host(&self, host: &str, port: u16) -> Option<Arc<Session>> {
        self.get_by_host_at(host, port, SystemTime::now())
    }

    pub fn get_by_host_at(&self, host: &str, port: u16, now: SystemTime) -> Option<Arc<Session>> {
        let id = *self.read().by_host.get(&host_port_key(host, port))?;
        self.get_at(&id, now)
    }

    /// Insert a session. Sessions with an empty id are not cacheable.
    pub fn put(&self, session: Arc<Session>) {
        self.put_at(session, SystemTime::now())
    }

    pub fn put_at(&self, session: Arc<Session>, now: SystemTime) {
        let id = session.id();
        if id.is_empty() {
            return;
        }

        let tick = self.tick();
        let mut inner = self.write();

        if !inner.by_id.contains_key(&id) {
            inner.make_room(now);
        }

        if let Some(key) = session.host_key() {
            inner.by_host.insert(key, id);
        }
        inner.by_id.insert(
            id,
            Entry {
                session,
                last_used: AtomicU64::new(tick),
            },
        );
        trace!("Cached session {} ({} entries)", id, inner.by_id.len());
    }

    /// Remove a session under both of its keys.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.write().remove(id)
    }

    /// Ids of all sessions that have not expired.
    pub fn ids(&self) -> Vec<SessionId> {
        self.ids_at(SystemTime::now())
    }

    pub fn ids_at(&self, now: SystemTime) -> Vec<SessionId> {
        let inner = self.read();
        inner
            .by_id
            .iter()
            .filter(|(_, e)| {
                let expired = e.session.is_expired(inner.timeout, now);
                if expired {
                    e.session.invalidate();
                }
                !expired
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_timeout(&self) -> Duration {
        self.read().timeout
    }

    /// Change the timeout. Applies to cached sessions on their next lookup.
    pub fn set_session_timeout(&self, timeout: Duration) {
        self.write().timeout = timeout;
    }

    pub fn cache_size(&self) -> usize {
        self.read().capacity
    }

    /// Change the capacity, evicting least recently used entries if the
    /// cache is now over it.
    pub fn set_cache_size(&self, capacity: usize) {
        let mut inner = self.write();
        inner.capacity = capacity;
        if capacity > 0 {
            while inner.by_id.len() > capacity {
                inner.evict_lru();
            }
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    // A panic while holding the lock leaves the maps consistent, so poison
    // is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn remove(&mut self, id: &SessionId) -> Option<Arc<Session>> {
        let entry = self.by_id.remove(id)?;
        if let Some(key) = entry.session.host_key() {
            // The host key may already point at a newer session.
            if self.by_host.get(&key) == Some(id) {
                self.by_host.remove(&key);
            }
        }
        Some(entry.session)
    }

    fn make_room(&mut self, now: SystemTime) {
        if self.capacity == 0 || self.by_id.len() < self.capacity {
            return;
        }

        let timeout = self.timeout;
        let stale: Vec<SessionId> = self
            .by_id
            .iter()
            .filter(|(_, e)| {
                !e.session.is_rejoinable() || e.session.is_expired(timeout, now)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            if let Some(s) = self.remove(id) {
                s.invalidate();
            }
        }

        while self.by_id.len() >= self.capacity {
            self.evict_lru();
        }
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .by_id
            .iter()
            .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            trace!("Evicting session {}", id);
            self.remove(&id);
        }
    }
}

fn checked_size(value: i64) -> Result<usize, Error> {
    usize::try_from(value)
        .map_err(|_| Error::ConfigError(format!("Invalid session cache size: {}", value)))
}

fn checked_timeout(value: i64) -> Result<u64, Error> {
    u64::try_from(value)
        .map_err(|_| Error::ConfigError(format!("Invalid session timeout: {}", value)))
}
