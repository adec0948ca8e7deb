use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use soldy_agent::{ConversationId, Session};
use soldy_core::ApplicationError;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(1800);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct Slot {
    session: Arc<AsyncMutex<Session>>,
    last_used: Instant,
}

impl Slot {
    /// A request guard holds a second reference while it is being served.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// Per-conversation sessions, each behind its own async lock. A second
/// request for a conversation that is already being served is refused.
/// Idle sessions are swept on every acquire, and the least recently used
/// idle ones go first once the store is full.
pub struct SessionStore {
    history_cap: usize,
    idle_ttl: Duration,
    max_sessions: usize,
    sessions: Mutex<HashMap<ConversationId, Slot>>,
}

impl SessionStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            history_cap,
            idle_ttl: DEFAULT_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limits(mut self, idle_ttl: Duration, max_sessions: usize) -> Self {
        self.idle_ttl = idle_ttl;
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn acquire(&self, id: &ConversationId) -> Result<OwnedMutexGuard<Session>, ApplicationError> {
        self.acquire_at(id, Instant::now())
    }

    fn acquire_at(
        &self,
        id: &ConversationId,
        now: Instant,
    ) -> Result<OwnedMutexGuard<Session>, ApplicationError> {
        let session = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            self.evict(&mut sessions, id, now);
            let slot = sessions.entry(id.clone()).or_insert_with(|| {
                debug!(event_name = "server.session.created", conversation_id = %id);
                Slot {
                    session: Arc::new(AsyncMutex::new(Session::new(id.clone(), self.history_cap))),
                    last_used: now,
                }
            });
            slot.last_used = now;
            slot.session.clone()
        };
        session.try_lock_owned().map_err(|_| ApplicationError::RequestInProgress(id.to_string()))
    }

    fn evict(&self, sessions: &mut HashMap<ConversationId, Slot>, incoming: &ConversationId, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, slot| {
            slot.in_use() || now.saturating_duration_since(slot.last_used) < self.idle_ttl
        });

        if !sessions.contains_key(incoming) && sessions.len() >= self.max_sessions {
            let mut idle: Vec<(Instant, ConversationId)> = sessions
                .iter()
                .filter(|(_, slot)| !slot.in_use())
                .map(|(id, slot)| (slot.last_used, id.clone()))
                .collect();
            idle.sort_by_key(|(last_used, _)| *last_used);
            let excess = sessions.len() + 1 - self.max_sessions;
            for (_, id) in idle.into_iter().take(excess) {
                sessions.remove(&id);
            }
        }

        let evicted = before.saturating_sub(sessions.len());
        if evicted > 0 {
            debug!(event_name = "server.session.evicted", evicted, remaining = sessions.len());
        }
    }
}
