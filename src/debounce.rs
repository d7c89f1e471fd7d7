//! Per-device, per-channel memory of which pumps are already running.
//!
//! An entry says "this channel is busy until `active_until`". Entries are
//! never deleted on expiry; a stale entry simply stops counting once `now`
//! reaches it. Switching a channel off ends its window at that moment. [`DebounceStore::try_activate`] is an atomic check-and-set so
//! two readings racing for the same device and channel cannot both win.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use time::{Duration, OffsetDateTime};

use crate::models::Channel;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebounceKey {
    pub device_id: String,
    pub channel: Channel,
}

impl DebounceKey {
    pub fn new(device_id: impl Into<String>, channel: Channel) -> Self {
        Self {
            device_id: device_id.into(),
            channel,
        }
    }
}

/// Storage for debounce windows, injected into the decision engine.
pub trait DebounceStore: Send + Sync {
    /// When the channel's current window ends, if one was ever recorded.
    fn active_until(&self, key: &DebounceKey) -> Option<OffsetDateTime>;

    /// Whether the channel is still inside its window at `now`.
    fn is_active(&self, key: &DebounceKey, now: OffsetDateTime) -> bool {
        self.active_until(key).is_some_and(|until| now < until)
    }

    /// Opens a window of `duration` starting at `now` unless one is already
    /// open. Returns `true` when this call opened it.
    fn try_activate(&self, key: &DebounceKey, now: OffsetDateTime, duration: Duration) -> bool;

    /// Ends an open window at `now`, after the channel was switched off.
    fn release(&self, key: &DebounceKey, now: OffsetDateTime);

    /// Drops expired entries. Returns how many were removed.
    fn sweep_expired(&self, now: OffsetDateTime) -> usize;
}

type Slot = Mutex<Option<OffsetDateTime>>;

/// In-process store with one lock per device/channel pair.
///
/// Claims hold the map's read lock, so claims on different keys run in
/// parallel while [`DebounceStore::sweep_expired`] cannot drop a slot that
/// is being claimed.
#[derive(Debug, Default)]
pub struct InMemoryDebounceStore {
    slots: RwLock<HashMap<DebounceKey, Slot>>,
}

impl InMemoryDebounceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn claim(slot: &Slot, key: &DebounceKey, now: OffsetDateTime, duration: Duration) -> bool {
    let mut until = slot.lock().unwrap_or_else(PoisonError::into_inner);

    if (*until).is_some_and(|u| now < u) {
        tracing::debug!(
            "{} channel on {} already active until {:?}",
            key.channel,
            key.device_id,
            *until
        );
        return false;
    }

    *until = Some(now + duration);
    true
}

impl DebounceStore for InMemoryDebounceStore {
    fn active_until(&self, key: &DebounceKey) -> Option<OffsetDateTime> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(key)?;
        let until = *slot.lock().unwrap_or_else(PoisonError::into_inner);
        until
    }

    fn try_activate(&self, key: &DebounceKey, now: OffsetDateTime, duration: Duration) -> bool {
        {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(key) {
                return claim(slot, key, now, duration);
            }
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key.clone()).or_default();
        claim(slot, key, now, duration)
    }

    fn release(&self, key: &DebounceKey, now: OffsetDateTime) {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.get(key) else {
            return;
        };
        let mut until = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if (*until).is_some_and(|u| now < u) {
            *until = Some(now);
        }
    }

    fn sweep_expired(&self, now: OffsetDateTime) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|_, slot| {
            let until = *slot.get_mut().unwrap_or_else(PoisonError::into_inner);
            until.is_some_and(|until| now < until)
        });
        before - slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap()
    }

    #[test]
    fn window_blocks_until_expiry() {
        let store = InMemoryDebounceStore::new();
        let key = DebounceKey::new("dev-1", Channel::Fertilizer);

        assert!(store.try_activate(&key, t0(), Duration::seconds(180)));
        assert!(store.is_active(&key, t0() + Duration::seconds(179)));
        assert!(!store.try_activate(&key, t0() + Duration::seconds(179), Duration::seconds(180)));

        // Lazy expiry: at exactly active_until the window is over.
        assert!(!store.is_active(&key, t0() + Duration::seconds(180)));
        assert!(store.try_activate(&key, t0() + Duration::seconds(180), Duration::seconds(180)));
        assert_eq!(store.active_until(&key), Some(t0() + Duration::seconds(360)));
    }

    #[test]
    fn keys_are_independent() {
        let store = InMemoryDebounceStore::new();
        let water = DebounceKey::new("dev-1", Channel::Water);
        let fert = DebounceKey::new("dev-1", Channel::Fertilizer);
        let other = DebounceKey::new("dev-2", Channel::Fertilizer);

        assert!(store.try_activate(&fert, t0(), Duration::seconds(180)));
        assert!(store.try_activate(&water, t0(), Duration::seconds(420)));
        assert!(store.try_activate(&other, t0(), Duration::seconds(180)));
        assert!(store.active_until(&DebounceKey::new("dev-3", Channel::Water)).is_none());
    }

    #[test]
    fn release_ends_window_early() {
        let store = InMemoryDebounceStore::new();
        let key = DebounceKey::new("dev-1", Channel::Water);

        assert!(store.try_activate(&key, t0(), Duration::seconds(420)));
        store.release(&key, t0() + Duration::seconds(60));
        assert!(!store.is_active(&key, t0() + Duration::seconds(60)));
        assert!(store.try_activate(&key, t0() + Duration::seconds(61), Duration::seconds(420)));

        // Releasing an unknown or already expired key changes nothing.
        store.release(&DebounceKey::new("dev-2", Channel::Water), t0());
        assert!(store.active_until(&DebounceKey::new("dev-2", Channel::Water)).is_none());
        store.release(&key, t0() + Duration::seconds(9999));
        assert_eq!(store.active_until(&key), Some(t0() + Duration::seconds(481)));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = InMemoryDebounceStore::new();
        store.try_activate(&DebounceKey::new("a", Channel::Water), t0(), Duration::seconds(10));
        store.try_activate(&DebounceKey::new("b", Channel::Water), t0(), Duration::seconds(100));

        assert_eq!(store.sweep_expired(t0() + Duration::seconds(50)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn racing_activations_have_one_winner() {
        let store = InMemoryDebounceStore::new();
        let key = DebounceKey::new("dev-race", Channel::Fertilizer);

        let winners = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| store.try_activate(&key, t0(), Duration::seconds(180))))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });

        assert_eq!(winners, 1);
    }
}
