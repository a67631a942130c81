//! Correlation store: relayed message id -> originating user id.
//!
//! Every item the relay delivers into the operator chat (header notice or forwarded copy) is
//! recorded here so the operator's reply-target can be resolved back to the end-user.
//! Growth is bounded by an entry count (oldest evicted first) and an optional age limit.
//! Evicting an entry means a reply to that relayed message can no longer be routed.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::channels::{MessageId, UserId};

/// Bounds on the store. `None` disables the corresponding bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_entries: Option<usize>,
    pub ttl: Option<Duration>,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_entries: Some(10_000),
            ttl: None,
        }
    }
}

impl StoreLimits {
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            ttl: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    origin_user_id: UserId,
    inserted_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<MessageId, Entry>,
    /// Insertion order; front is oldest. Always holds exactly the keys of `entries`.
    order: VecDeque<MessageId>,
}

impl Inner {
    fn evict_oldest(&mut self) -> Option<MessageId> {
        let id = self.order.pop_front()?;
        self.entries.remove(&id);
        Some(id)
    }

    fn prune_expired(&mut self, ttl: Duration, now: Instant) {
        while let Some(front) = self.order.front() {
            let expired = self
                .entries
                .get(front)
                .map(|e| now.saturating_duration_since(e.inserted_at) >= ttl)
                .unwrap_or(true);
            if !expired {
                break;
            }
            self.evict_oldest();
        }
    }
}

/// In-memory correlation store shared by all event tasks.
pub struct CorrelationStore {
    inner: RwLock<Inner>,
    limits: StoreLimits,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

impl CorrelationStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            limits,
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Record that `relayed_message_id` was relayed on behalf of `origin_user_id`.
    /// Overwrites an existing mapping (last write wins); never fails.
    pub async fn put(&self, relayed_message_id: MessageId, origin_user_id: UserId) {
        let mut g = self.inner.write().await;
        // Stamped under the lock so `order` stays sorted by age.
        let now = Instant::now();
        self.insert(&mut g, relayed_message_id, origin_user_id, now);
    }

    /// Resolve the user a relayed message belongs to. `None` when unknown, evicted or expired.
    pub async fn get(&self, relayed_message_id: MessageId) -> Option<UserId> {
        self.get_at(relayed_message_id, Instant::now()).await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    pub(crate) async fn put_at(
        &self,
        relayed_message_id: MessageId,
        origin_user_id: UserId,
        now: Instant,
    ) {
        let mut g = self.inner.write().await;
        self.insert(&mut g, relayed_message_id, origin_user_id, now);
    }

    fn insert(
        &self,
        g: &mut Inner,
        relayed_message_id: MessageId,
        origin_user_id: UserId,
        now: Instant,
    ) {
        if let Some(ttl) = self.limits.ttl {
            g.prune_expired(ttl, now);
        }
        if let Some(entry) = g.entries.get_mut(&relayed_message_id) {
            // Overwrite keeps the original position and age.
            entry.origin_user_id = origin_user_id;
            return;
        }
        if let Some(max) = self.limits.max_entries {
            while g.entries.len() >= max {
                match g.evict_oldest() {
                    Some(evicted) => log::debug!("correlation: evicted relayed message {}", evicted),
                    None => break,
                }
            }
        }
        g.entries.insert(
            relayed_message_id,
            Entry {
                origin_user_id,
                inserted_at: now,
            },
        );
        g.order.push_back(relayed_message_id);
    }

    pub(crate) async fn get_at(&self, relayed_message_id: MessageId, now: Instant) -> Option<UserId> {
        let g = self.inner.read().await;
        let entry = g.entries.get(&relayed_message_id)?;
        if let Some(ttl) = self.limits.ttl {
            if now.saturating_duration_since(entry.inserted_at) >= ttl {
                return None;
            }
        }
        Some(entry.origin_user_id)
    }
}
