use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use shared::events::{LibraryEvent, LibraryEventKind};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the live channel and of the replay history.
pub const EVENT_CAPACITY: usize = 100;

/// Fan-out of library events: a broadcast channel for live subscribers and a
/// bounded history for late readers.
pub struct EventBus {
    sender: broadcast::Sender<LibraryEvent>,
    history: Mutex<VecDeque<LibraryEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(EVENT_CAPACITY)),
        }
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<LibraryEvent>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, kind: LibraryEventKind) {
        let event = LibraryEvent::now(kind);
        {
            let mut history = self.history();
            if history.len() == EVENT_CAPACITY {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // No subscribers is fine; the history still has it.
        if self.sender.send(event).is_err() {
            debug!("Library event published with no live subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.sender.subscribe()
    }

    /// Up to `limit` most recent events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<LibraryEvent> {
        let history = self.history();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_ordered() {
        let bus = EventBus::new();
        for processed in 0..(EVENT_CAPACITY + 5) {
            bus.publish(LibraryEventKind::ScanFinished {
                processed,
                full: false,
            });
        }
        let recent = bus.recent(usize::MAX);
        assert_eq!(recent.len(), EVENT_CAPACITY);
        assert_eq!(
            recent[0].kind,
            LibraryEventKind::ScanFinished {
                processed: 5,
                full: false
            }
        );
        assert_eq!(bus.recent(2).len(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_live_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(LibraryEventKind::ScanStarted { full: true });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, LibraryEventKind::ScanStarted { full: true });
    }
}
