//! Transition Queue - one ordered stream of navigation commands.
//!
//! Any number of producers may enqueue concurrently; only the enqueue itself
//! takes the lock. Exactly one consumer drains at a time:
//!
//! ```text
//! enqueue ──► idle?  ── yes ──► caller starts a drain loop
//!                    └─ no ───► the running drain loop picks it up
//!
//! drain loop: while let Some(cmd) = queue.next() { run cmd to completion }
//! ```
//!
//! `next()` marks the queue idle in the same critical section that observes
//! it empty, so a command can never be stranded between a finishing drain
//! and a new producer.
//!
//! Each command carries a [`Completer`]; the requester awaits the matching
//! [`Ticket`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{NavError, Result};

// =============================================================================
// Queue
// =============================================================================

#[derive(Debug)]
struct QueueState<C> {
    pending: VecDeque<C>,
    draining: bool,
}

/// FIFO with single-drainer hand-off.
#[derive(Debug)]
pub struct TransitionQueue<C> {
    state: Mutex<QueueState<C>>,
}

impl<C> Default for TransitionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TransitionQueue<C> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    /// Append a command.
    ///
    /// Returns true when the queue was idle: the caller now owns the drain
    /// and must keep calling [`next`](Self::next) until it returns `None`.
    #[must_use = "a true result means the caller must start draining"]
    pub fn enqueue(&self, command: C) -> bool {
        self.enqueue_all([command])
    }

    /// Append several commands back to back, with nothing interleaved.
    #[must_use = "a true result means the caller must start draining"]
    pub fn enqueue_all(&self, commands: impl IntoIterator<Item = C>) -> bool {
        let mut state = self.state.lock();
        state.pending.extend(commands);
        if state.draining || state.pending.is_empty() {
            false
        } else {
            state.draining = true;
            true
        }
    }

    /// Pop the next command for the drain loop.
    ///
    /// Returns `None` and marks the queue idle once it is empty.
    pub fn next(&self) -> Option<C> {
        let mut state = self.state.lock();
        let command = state.pending.pop_front();
        if command.is_none() {
            state.draining = false;
        }
        command
    }

    /// Take every pending command without executing it.
    pub fn drain_pending(&self) -> Vec<C> {
        self.state.lock().pending.drain(..).collect()
    }

    pub fn is_draining(&self) -> bool {
        self.state.lock().draining
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}

// =============================================================================
// Completion
// =============================================================================

/// Create a linked completer/ticket pair.
pub fn ticket<T>() -> (Completer<T>, Ticket<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Ticket { rx })
}

/// Sending half, travels with the queued command.
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
    /// Deliver the outcome. A requester that stopped waiting is ignored.
    pub fn complete(self, outcome: Result<T>) {
        let _ = self.tx.send(outcome);
    }

    /// True if the requester dropped its ticket.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Resolves with the outcome of a queued command.
///
/// Resolves to `ShutDown` if the command was discarded without running.
#[derive(Debug)]
#[must_use = "a ticket does nothing unless awaited"]
pub struct Ticket<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Ticket<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(NavError::ShutDown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_enqueue_claims_drain() {
        let queue = TransitionQueue::new();

        assert!(queue.enqueue(1));
        assert!(!queue.enqueue(2));
        assert!(!queue.enqueue(3));
        assert!(queue.is_draining());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_fifo_order_and_idle_handoff() {
        let queue = TransitionQueue::new();
        assert!(queue.enqueue("a"));
        assert!(!queue.enqueue("b"));

        assert_eq!(queue.next(), Some("a"));
        // Enqueued while draining: picked up by the same loop
        assert!(!queue.enqueue("c"));
        assert_eq!(queue.next(), Some("b"));
        assert_eq!(queue.next(), Some("c"));
        assert_eq!(queue.next(), None);

        assert!(!queue.is_draining());
        assert!(queue.enqueue("d"));
    }

    #[test]
    fn test_enqueue_all_is_contiguous() {
        let queue = TransitionQueue::new();
        assert!(queue.enqueue(0));
        assert!(!queue.enqueue_all([1, 2]));
        assert!(!queue.enqueue(3));

        let drained: Vec<_> = std::iter::from_fn(|| queue.next()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_enqueue_nothing_does_not_claim() {
        let queue: TransitionQueue<u8> = TransitionQueue::new();
        assert!(!queue.enqueue_all([]));
        assert!(!queue.is_draining());
    }

    #[test]
    fn test_concurrent_producers_single_drainer() {
        let queue = Arc::new(TransitionQueue::new());
        let mut producers = Vec::new();

        for t in 0..4 {
            let queue = queue.clone();
            producers.push(thread::spawn(move || {
                (0..100)
                    .filter(|i| queue.enqueue(t * 100 + i))
                    .count()
            }));
        }

        let claims: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
        assert_eq!(claims, 1);

        let mut drained: Vec<_> = std::iter::from_fn(|| queue.next()).collect();
        assert_eq!(drained.len(), 400);
        drained.sort();
        drained.dedup();
        assert_eq!(drained.len(), 400);
    }

    #[tokio::test]
    async fn test_ticket_resolves() {
        let (completer, ticket) = ticket::<u32>();
        completer.complete(Ok(7));
        assert_eq!(ticket.await, Ok(7));
    }

    #[tokio::test]
    async fn test_dropped_completer_means_shutdown() {
        let (completer, ticket) = ticket::<u32>();
        drop(completer);
        assert_eq!(ticket.await, Err(NavError::ShutDown));
    }

    #[test]
    fn test_abandoned_ticket() {
        let (completer, ticket) = ticket::<u32>();
        assert!(!completer.is_abandoned());
        drop(ticket);
        assert!(completer.is_abandoned());
        completer.complete(Ok(1));
    }
}
