//! In-memory processed event store.
//!
//! Keeps the most recent `capacity` claimed event ids. Lark redelivers
//! within minutes, so a bounded window is enough and memory stays flat.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::ProcessedEventStore;

/// Default number of event ids remembered.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Claims {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// Bounded in-memory `ProcessedEventStore`.
#[derive(Debug)]
pub struct InMemoryProcessedEventStore {
    claims: Mutex<Claims>,
    capacity: usize,
}

impl Default for InMemoryProcessedEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            claims: Mutex::new(Claims::default()),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.claims.lock().await.ids.len()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn claim(&self, event_id: &str) -> bool {
        let mut claims = self.claims.lock().await;
        if claims.ids.contains(event_id) {
            return false;
        }

        while claims.order.len() >= self.capacity {
            if let Some(oldest) = claims.order.pop_front() {
                claims.ids.remove(&oldest);
            }
        }
        claims.ids.insert(event_id.to_string());
        claims.order.push_back(event_id.to_string());
        true
    }

    async fn release(&self, event_id: &str) {
        let mut claims = self.claims.lock().await;
        if claims.ids.remove(event_id) {
            claims.order.retain(|id| id != event_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_claim_wins() {
        let store = InMemoryProcessedEventStore::new();

        assert!(store.claim("ev-1").await);
        assert!(!store.claim("ev-1").await);
        assert!(store.claim("ev-2").await);
    }

    #[tokio::test]
    async fn released_ids_can_be_claimed_again() {
        let store = InMemoryProcessedEventStore::new();
        store.claim("ev-1").await;

        store.release("ev-1").await;

        assert!(store.claim("ev-1").await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn forgets_oldest_beyond_capacity() {
        let store = InMemoryProcessedEventStore::with_capacity(2);
        store.claim("a").await;
        store.claim("b").await;
        store.claim("c").await;

        assert_eq!(store.len().await, 2);
        assert!(store.claim("a").await, "oldest id should have been evicted");
        assert!(!store.claim("c").await);
    }
}
