//! Per-key write sequencing.
//!
//! Serializes writers that share a key (an email, a user id) inside this process. It
//! does nothing for writers in other processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct WriteSequencer {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one keyed write.
#[derive(Debug)]
pub struct SequencedWrite {
    _guard: OwnedMutexGuard<()>,
}

impl WriteSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other writer holds `key`, then hold it until the returned guard drops.
    pub async fn acquire(&self, key: impl Into<String>) -> SequencedWrite {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Slots nobody holds or waits on.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(key.into()).or_default().clone()
        };
        SequencedWrite {
            _guard: slot.lock_owned().await,
        }
    }

    /// Acquire every key in `keys`, deduplicated and in sorted order. Writers that hold
    /// one key and then take a set through here never wait on each other in a cycle.
    pub async fn acquire_all(&self, keys: impl IntoIterator<Item = String>) -> Vec<SequencedWrite> {
        let mut keys: Vec<String> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            held.push(self.acquire(key).await);
        }
        held
    }

    #[cfg(test)]
    fn active_keys(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_waits() {
        let seq = Arc::new(WriteSequencer::new());
        let first = seq.acquire("email:a@x.com").await;

        let waiter = {
            let seq = seq.clone();
            tokio::spawn(async move {
                let _g = seq.acquire("email:a@x.com").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let seq = WriteSequencer::new();
        let _a = seq.acquire("id:1").await;
        let b = tokio::time::timeout(Duration::from_millis(200), seq.acquire("id:2")).await;
        assert!(b.is_ok());
        assert_eq!(seq.active_keys(), 2);
    }

    #[tokio::test]
    async fn acquire_all_deduplicates_keys() {
        let seq = WriteSequencer::new();
        let held = tokio::time::timeout(
            Duration::from_millis(200),
            seq.acquire_all(["email:b@x.com".to_string(), "email:a@x.com".into(), "email:b@x.com".into()]),
        )
        .await
        .unwrap();
        assert_eq!(held.len(), 2);
        assert_eq!(seq.active_keys(), 2);
    }

    #[tokio::test]
    async fn acquire_all_blocks_on_any_held_key() {
        let seq = Arc::new(WriteSequencer::new());
        let first = seq.acquire("email:b@x.com").await;

        let waiter = {
            let seq = seq.clone();
            tokio::spawn(async move {
                let _g = seq
                    .acquire_all(["email:a@x.com".to_string(), "email:b@x.com".into()])
                    .await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn released_slots_are_reclaimed() {
        let seq = WriteSequencer::new();
        drop(seq.acquire("id:1").await);
        let _b = seq.acquire("id:2").await;
        assert_eq!(seq.slots.lock().unwrap().len(), 1);
    }
}
