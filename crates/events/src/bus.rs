//! Ordered fan-out of choreography events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

use crate::types::{Event, EventEnvelope};

/// Events kept for a slow observer before it starts missing them.
const DEFAULT_CAPACITY: usize = 1000;

/// Stamps events with a stream position and hands them to every observer.
///
/// All clones share one stream. The stream ends for observers once every
/// clone has been dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    next_seq: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append `event` to the stream and return its position. Positions are
    /// taken even when nobody is observing.
    pub fn emit(&self, event: Event) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        // No observers is fine
        let _ = self.sender.send(EventEnvelope::new(seq, event));
        seq
    }

    /// Observe every event emitted from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Position the next event will get.
    pub fn position(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("position", &self.position())
            .field("observers", &self.sender.receiver_count())
            .finish()
    }
}

/// One observer's view of a bus. Events overwritten before they were read
/// are counted rather than reported as errors.
#[derive(Debug)]
pub struct EventStream {
    rx: broadcast::Receiver<EventEnvelope>,
    missed: u64,
}

impl EventStream {
    /// Next event in emission order, or `None` once the bus is gone and
    /// everything queued has been read.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(n)) => self.missed += n,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Everything already queued, without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => events.push(envelope.event),
                Err(TryRecvError::Lagged(n)) => self.missed += n,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }

    /// Events this observer lost to lag so far.
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubewright_core::Phase;
    use uuid::Uuid;

    fn recorded(name: &str) -> Event {
        Event::EntityRecorded {
            remote_name: name.to_string(),
        }
    }

    #[test]
    fn test_positions_advance_without_observers() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(recorded("head1_BASE")), 0);
        assert_eq!(bus.emit(recorded("head2_BASE")), 1);
        assert_eq!(bus.position(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_one_stream() {
        let bus = EventBus::new();
        let publisher = bus.clone();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let session_id = Uuid::new_v4();
        bus.emit(Event::SessionStarted { session_id });
        publisher.emit(Event::PhaseStarted {
            session_id,
            phase: Phase::Link,
        });

        for stream in [&mut first, &mut second] {
            let a = stream.next().await.unwrap();
            let b = stream.next().await.unwrap();
            assert_eq!((a.seq, b.seq), (0, 1));
            assert_eq!(b.event.session_id(), Some(session_id));
        }
    }

    #[tokio::test]
    async fn test_stream_ends_after_last_bus_dropped() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe();
        let publisher = bus.clone();
        drop(bus);

        publisher.emit(recorded("a"));
        drop(publisher);

        assert_eq!(stream.next().await.unwrap().seq, 0);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_drain_returns_queued_in_order() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe();
        for name in ["a", "b", "c"] {
            bus.emit(Event::LinkRecorded {
                joint_name: name.to_string(),
            });
        }

        let names: Vec<String> = stream
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                Event::LinkRecorded { joint_name } => Some(joint_name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(stream.drain().is_empty());
        assert_eq!(stream.missed(), 0);
    }

    #[test]
    fn test_lagging_observer_counts_missed() {
        let bus = EventBus::with_capacity(2);
        let mut stream = bus.subscribe();
        for i in 0..5 {
            bus.emit(recorded(&format!("cube{}", i)));
        }

        let events = stream.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(stream.missed(), 3);
        assert!(matches!(
            &events[1],
            Event::EntityRecorded { remote_name } if remote_name == "cube4"
        ));
    }
}
