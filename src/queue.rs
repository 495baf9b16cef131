use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use serenity::all::GuildId;
use tracing::warn;

use crate::metrics::METRICS;

/// A resolved, playable audio reference. Immutable once resolved; consumed
/// exactly once when dequeued for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub source_url: String,
    pub title: String,
}

/// Per-guild FIFO of resolved tracks.
///
/// Each guild owns an independent slot behind its own lock; the registry
/// lock is only held long enough to find or create a slot, so operations on
/// different guilds never serialize against each other. Slot creation is a
/// single get-or-insert under the registry lock, so a slot can never be
/// observed half-initialized.
#[derive(Clone, Default)]
pub struct QueueStore {
    slots: Arc<RwLock<HashMap<GuildId, Arc<Mutex<VecDeque<Track>>>>>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, guild_id: GuildId) -> Arc<Mutex<VecDeque<Track>>> {
        {
            let map = self.slots.read().unwrap_or_else(|p| p.into_inner());
            if let Some(slot) = map.get(&guild_id) {
                return slot.clone();
            }
        }
        let mut map = self.slots.write().unwrap_or_else(|p| p.into_inner());
        map.entry(guild_id).or_default().clone()
    }

    /// Runs `f` over the guild's queue. A slot poisoned by a panicking
    /// holder is reset to empty and reused; the caller never sees an error.
    fn with_queue<R>(&self, guild_id: GuildId, f: impl FnOnce(&mut VecDeque<Track>) -> R) -> R {
        let slot = self.slot(guild_id);
        let mut queue = match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("queue for guild {guild_id} was poisoned, resetting to empty");
                METRICS.inc_queue_repair();
                slot.clear_poison();
                let mut guard = poisoned.into_inner();
                METRICS.dec_queue(guard.len());
                guard.clear();
                guard
            }
        };
        f(&mut queue)
    }

    pub fn enqueue(&self, guild_id: GuildId, track: Track) {
        self.with_queue(guild_id, |q| q.push_back(track));
        METRICS.inc_queue(1);
    }

    pub fn dequeue_front(&self, guild_id: GuildId) -> Option<Track> {
        let track = self.with_queue(guild_id, |q| q.pop_front());
        if track.is_some() {
            METRICS.dec_queue(1);
        }
        track
    }

    /// Empties the guild's queue in place; the slot itself stays registered.
    pub fn clear(&self, guild_id: GuildId) {
        self.with_queue(guild_id, |q| {
            METRICS.dec_queue(q.len());
            q.clear();
        });
    }

    pub fn len(&self, guild_id: GuildId) -> usize {
        self.with_queue(guild_id, |q| q.len())
    }

    pub fn is_empty(&self, guild_id: GuildId) -> bool {
        self.len(guild_id) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track {
            source_url: format!("https://audio.example/{title}"),
            title: title.to_string(),
        }
    }

    #[test]
    fn dequeue_order_is_enqueue_order() {
        let store = QueueStore::new();
        let guild = GuildId::new(1);
        for name in ["a", "b", "c"] {
            store.enqueue(guild, track(name));
        }
        let order: Vec<String> = std::iter::from_fn(|| store.dequeue_front(guild))
            .map(|t| t.title)
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(store.dequeue_front(guild), None);
    }

    #[test]
    fn dequeue_on_empty_is_none() {
        let store = QueueStore::new();
        assert_eq!(store.dequeue_front(GuildId::new(7)), None);
    }

    #[test]
    fn clear_keeps_the_slot_usable() {
        let store = QueueStore::new();
        let guild = GuildId::new(2);
        store.enqueue(guild, track("a"));
        store.enqueue(guild, track("b"));
        store.clear(guild);
        assert!(store.is_empty(guild));
        store.enqueue(guild, track("c"));
        assert_eq!(store.dequeue_front(guild).unwrap().title, "c");
    }

    #[test]
    fn guilds_are_isolated() {
        let store = QueueStore::new();
        let one = GuildId::new(10);
        let two = GuildId::new(20);
        store.enqueue(one, track("one-a"));
        store.enqueue(two, track("two-a"));
        store.enqueue(one, track("one-b"));
        assert_eq!(store.len(one), 2);
        assert_eq!(store.len(two), 1);
        store.clear(one);
        assert_eq!(store.len(two), 1);
        assert_eq!(store.dequeue_front(two).unwrap().title, "two-a");
    }

    #[test]
    fn concurrent_enqueues_are_not_lost() {
        let store = QueueStore::new();
        let guild = GuildId::new(3);
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.enqueue(guild, track(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }
        assert_eq!(store.len(guild), 800);
    }

    #[test]
    fn poisoned_slot_heals_to_empty() {
        let store = QueueStore::new();
        let guild = GuildId::new(4);
        store.enqueue(guild, track("doomed"));

        let slot = store.slot(guild);
        let _ = std::thread::spawn(move || {
            let _guard = slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        // First access repairs: the queue comes back empty and works.
        assert_eq!(store.len(guild), 0);
        store.enqueue(guild, track("fresh"));
        assert_eq!(store.dequeue_front(guild).unwrap().title, "fresh");
        assert_eq!(store.dequeue_front(guild), None);
    }
}
