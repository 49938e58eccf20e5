//! Change notifications emitted by the mutation layer.

use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::crm::types::EntityKind;

/// Store change events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
  /// A kind's cache segment was invalidated; consumers should refetch
  Invalidated(EntityKind),
  /// The whole store was reset
  Cleared,
}

/// Fans store events out to any number of subscribers.
///
/// Subscribers that dropped their receiver are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
  senders: Mutex<Vec<mpsc::UnboundedSender<StoreEvent>>>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a new subscriber.
  pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    if let Ok(mut senders) = self.senders.lock() {
      senders.push(tx);
    }
    rx
  }

  /// Deliver an event to every live subscriber.
  pub fn emit(&self, event: StoreEvent) {
    if let Ok(mut senders) = self.senders.lock() {
      senders.retain(|tx| tx.send(event).is_ok());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn events_reach_every_subscriber() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.emit(StoreEvent::Invalidated(EntityKind::Leads));

    assert_eq!(a.recv().await, Some(StoreEvent::Invalidated(EntityKind::Leads)));
    assert_eq!(b.recv().await, Some(StoreEvent::Invalidated(EntityKind::Leads)));
  }

  #[tokio::test]
  async fn dropped_subscribers_are_pruned() {
    let bus = EventBus::new();
    let rx = bus.subscribe();
    drop(rx);

    bus.emit(StoreEvent::Cleared);
    assert_eq!(bus.senders.lock().unwrap().len(), 0);
  }
}
