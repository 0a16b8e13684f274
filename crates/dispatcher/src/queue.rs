//! EventQueue - bounded, non-blocking buffer between producers and the dispatcher

use contracts::{LogEvent, MAX_QUEUE_CAPACITY};
use tokio::sync::mpsc;

/// Create a queue holding at most `capacity` events
///
/// Clamped to `1..=MAX_QUEUE_CAPACITY`.
pub fn bounded(capacity: usize) -> (EventQueue, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_QUEUE_CAPACITY));
    (EventQueue { tx }, EventReceiver { rx })
}

/// Producer side of the queue
///
/// Cheap to clone; safe to use from any thread, inside or outside a runtime.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<LogEvent>,
}

impl EventQueue {
    /// Push without waiting
    ///
    /// Returns false if the event was dropped (queue full or dispatcher gone).
    pub fn try_push(&self, event: LogEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }

    /// Events currently queued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// True once the dispatcher side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Dispatcher side of the queue
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<LogEvent>,
}

impl EventReceiver {
    /// Wait for the next event; None once every producer is gone
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }

    /// Move every queued event into `out`, preserving order
    pub fn drain_into(&mut self, out: &mut Vec<LogEvent>) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
            drained += 1;
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(i: i64) -> LogEvent {
        LogEvent::new(format!("event-{i}"), i)
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let (queue, mut rx) = bounded(5);
        for i in 0..5 {
            assert!(queue.try_push(event(i)));
        }
        assert_eq!(queue.len(), 5);

        let mut out = Vec::new();
        assert_eq!(rx.drain_into(&mut out), 5);
        assert_eq!(out, (0..5).map(event).collect::<Vec<_>>());
    }

    #[test]
    fn test_over_capacity_drops_later_arrivals() {
        let (queue, mut rx) = bounded(3);
        let accepted: Vec<bool> = (0..7).map(|i| queue.try_push(event(i))).collect();
        assert_eq!(accepted, vec![true, true, true, false, false, false, false]);
        assert_eq!(queue.len(), 3);
        assert_eq!(rx.len(), 3);

        let mut out = Vec::new();
        rx.drain_into(&mut out);
        assert_eq!(out, vec![event(0), event(1), event(2)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_draining_frees_capacity() {
        let (queue, mut rx) = bounded(2);
        queue.try_push(event(0));
        queue.try_push(event(1));
        assert!(!queue.try_push(event(2)));

        let mut out = Vec::new();
        rx.drain_into(&mut out);
        assert!(queue.try_push(event(3)));
        rx.drain_into(&mut out);
        assert_eq!(out, vec![event(0), event(1), event(3)]);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let (queue, _rx) = bounded(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_huge_capacity_is_clamped() {
        let (queue, _rx) = bounded(usize::MAX / 4);
        assert_eq!(queue.capacity(), MAX_QUEUE_CAPACITY);
    }

    #[test]
    fn test_push_after_receiver_dropped() {
        let (queue, rx) = bounded(4);
        drop(rx);
        assert!(queue.is_closed());
        assert!(!queue.try_push(event(0)));
    }

    #[test]
    fn test_push_from_many_threads() {
        let (queue, mut rx) = bounded(1000);
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        queue.try_push(event(t * 100 + i));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let mut out = Vec::new();
        assert_eq!(rx.drain_into(&mut out), 400);
    }
}
