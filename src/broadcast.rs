//! Fan-out of [`ShowEvent`]s to connected observers.
//!
//! Observers hold the receiving half of an unbounded channel. A failed send
//! means the observer went away; it is pruned and the broadcast carries on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::models::events::ShowEvent;

struct Observer {
    id: u64,
    tx: UnboundedSender<ShowEvent>,
}

#[derive(Clone, Default)]
pub struct Broadcaster {
    observers: Arc<Mutex<Vec<Observer>>>,
    next_id: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (u64, UnboundedReceiver<ShowEvent>) {
        let (tx, rx) = unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.observers.lock().expect("broadcaster poisoned");
        guard.push(Observer { id, tx });
        log::debug!("[broadcast] observer {} connected ({} total)", id, guard.len());
        (id, rx)
    }

    pub fn unsubscribe(&self, id: u64) {
        let mut guard = self.observers.lock().expect("broadcaster poisoned");
        guard.retain(|o| o.id != id);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().expect("broadcaster poisoned").len()
    }

    /// Send to every observer, returning how many received it.
    pub fn broadcast(&self, event: ShowEvent) -> usize {
        let mut guard = self.observers.lock().expect("broadcaster poisoned");
        let before = guard.len();
        guard.retain(|observer| observer.tx.send(event.clone()).is_ok());
        let delivered = guard.len();
        if delivered < before {
            log::debug!("[broadcast] pruned {} disconnected observer(s)", before - delivered);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::playback::PlaybackSnapshot;

    fn event() -> ShowEvent {
        ShowEvent::Playback(PlaybackSnapshot {
            is_synced: true,
            is_playing: false,
            current_time: 1.0,
            last_drift: 0.0,
        })
    }

    #[tokio::test]
    async fn dropped_observers_are_pruned() {
        let broadcaster = Broadcaster::new();
        let (_, mut alive) = broadcaster.subscribe();
        let (_, gone) = broadcaster.subscribe();
        drop(gone);

        assert_eq!(broadcaster.broadcast(event()), 1);
        assert_eq!(broadcaster.observer_count(), 1);
        assert_eq!(alive.recv().await, Some(event()));
    }

    #[test]
    fn unsubscribe_removes_observer() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.subscribe();
        broadcaster.unsubscribe(id);
        assert_eq!(broadcaster.broadcast(event()), 0);
    }
}
