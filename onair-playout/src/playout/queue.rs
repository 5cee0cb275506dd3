//! Single-flight playout queue
//!
//! Pending tracks are held in arrival order. A `playing` gate allows at most
//! one track to be in flight; [`PlayoutQueue::try_begin`] sets the gate and
//! pops the head in one step under the queue lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use onair_common::events::QueueItem;

/// FIFO of pending tracks plus the single-flight gate
#[derive(Debug, Default)]
pub struct PlayoutQueue {
    pending: Mutex<VecDeque<QueueItem>>,
    playing: AtomicBool,
}

impl PlayoutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a track; returns its 0-based position among pending tracks
    ///
    /// Never blocks on playout and never rejects. The queue is unbounded.
    pub fn enqueue(&self, item: QueueItem) -> usize {
        let mut pending = self.lock();
        pending.push_back(item);
        pending.len() - 1
    }

    /// Claim the gate and take the head of the queue
    ///
    /// Returns `None` while a track is in flight or when nothing is pending.
    /// On `Some`, the caller owns the gate until [`finish`](Self::finish).
    pub fn try_begin(&self) -> Option<QueueItem> {
        let mut pending = self.lock();
        if self
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let next = pending.pop_front();
        if next.is_none() {
            self.playing.store(false, Ordering::Release);
        }
        next
    }

    /// Release the gate after the in-flight track is done (or dropped)
    pub fn finish(&self) {
        self.playing.store(false, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Number of pending tracks (excluding the one in flight)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the pending tracks in play order
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn track(title: &str) -> QueueItem {
        QueueItem::new(Uuid::new_v4(), title, "Artist", format!("/music/{}.flac", title))
    }

    #[test]
    fn test_enqueue_reports_position() {
        let queue = PlayoutQueue::new();
        assert_eq!(queue.enqueue(track("a")), 0);
        assert_eq!(queue.enqueue(track("b")), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_try_begin_is_fifo_and_single_flight() {
        let queue = PlayoutQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        let first = queue.try_begin().unwrap();
        assert_eq!(first.title, "a");
        assert!(queue.is_playing());
        assert!(queue.try_begin().is_none(), "gate must hold while a track is in flight");
        assert_eq!(queue.len(), 1);

        queue.finish();
        let second = queue.try_begin().unwrap();
        assert_eq!(second.title, "b");
    }

    #[test]
    fn test_try_begin_on_empty_queue_leaves_gate_open() {
        let queue = PlayoutQueue::new();
        assert!(queue.try_begin().is_none());
        assert!(!queue.is_playing());

        queue.enqueue(track("late"));
        assert_eq!(queue.try_begin().unwrap().title, "late");
    }

    #[test]
    fn test_concurrent_begin_claims_once() {
        use std::sync::Arc;

        let queue = Arc::new(PlayoutQueue::new());
        for i in 0..8 {
            queue.enqueue(track(&i.to_string()));
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || queue.try_begin().is_some())
            })
            .collect();
        let claimed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(claimed, 1);
        assert_eq!(queue.len(), 7);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let queue = PlayoutQueue::new();
        queue.enqueue(track("a"));
        let snapshot = queue.snapshot();
        queue.enqueue(track("b"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(queue.snapshot().len(), 2);
    }
}
