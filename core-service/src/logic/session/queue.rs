//! Signal Queue
//!
//! Bounded multi-producer queue feeding the single aggregator task.
//! Under pressure the oldest video/audio signal is shed. Window/input
//! signals and control items are never dropped for capacity.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::logic::diagnostics::Diagnostics;
use crate::logic::escalation::TerminateDirective;
use crate::logic::signal::Signal;

#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Signal(Signal),
    Directive(TerminateDirective),
    Complete,
}

impl QueueItem {
    fn is_droppable(&self) -> bool {
        matches!(self, QueueItem::Signal(s) if s.source().is_droppable())
    }
}

struct QueueState {
    items: VecDeque<QueueItem>,
    closed: bool,
}

pub struct SignalQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    diagnostics: Arc<Diagnostics>,
}

impl SignalQueue {
    pub fn new(capacity: usize, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
            diagnostics,
        }
    }

    /// Enqueue. Returns `false` once the queue is closed.
    pub fn push(&self, item: QueueItem) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }

            if state.items.len() >= self.capacity {
                if let Some(pos) = state.items.iter().position(QueueItem::is_droppable) {
                    state.items.remove(pos);
                    self.diagnostics.record_backpressure_drop();
                    log::debug!("[Queue] Full, shed oldest sampler signal");
                } else if item.is_droppable() {
                    self.diagnostics.record_backpressure_drop();
                    log::debug!("[Queue] Full of priority items, shed incoming sampler signal");
                    return true;
                }
                // Otherwise overcommit: priority items always get in
            }

            state.items.push_back(item);
        }
        self.notify.notify_one();
        true
    }

    /// Next item; `None` once closed and drained
    pub async fn pop(&self) -> Option<QueueItem> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Refuse new items; already queued ones can still be popped
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::signal::{
        AudioCategory, SignalCategory, SignalSource, VideoCategory, WindowCategory,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn signal(category: SignalCategory) -> QueueItem {
        QueueItem::Signal(Signal::new(category, 0.9, Utc::now()))
    }

    fn video() -> QueueItem {
        signal(SignalCategory::Video(VideoCategory::NoPerson))
    }

    fn audio() -> QueueItem {
        signal(SignalCategory::Audio(AudioCategory::Quiet))
    }

    fn window() -> QueueItem {
        signal(SignalCategory::Window(WindowCategory::TabHidden))
    }

    fn source_of(item: &QueueItem) -> Option<SignalSource> {
        match item {
            QueueItem::Signal(s) => Some(s.source()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = SignalQueue::new(8, Arc::new(Diagnostics::new()));
        queue.push(video());
        queue.push(window());
        queue.push(QueueItem::Complete);

        let first = queue.pop().await.unwrap();
        assert_eq!(source_of(&first), Some(SignalSource::Video));
        let second = queue.pop().await.unwrap();
        assert_eq!(source_of(&second), Some(SignalSource::Window));
        assert_eq!(queue.pop().await, Some(QueueItem::Complete));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_sheds_oldest_sampler_signal() {
        let diagnostics = Arc::new(Diagnostics::new());
        let queue = SignalQueue::new(3, diagnostics.clone());
        queue.push(window());
        queue.push(video());
        queue.push(audio());
        queue.push(window());

        assert_eq!(queue.len(), 3);
        assert_eq!(diagnostics.snapshot().signals_dropped, 1);

        let mut sources = Vec::new();
        while !queue.is_empty() {
            sources.push(source_of(&queue.pop().await.unwrap()));
        }
        assert_eq!(
            sources,
            vec![
                Some(SignalSource::Window),
                Some(SignalSource::Audio),
                Some(SignalSource::Window),
            ]
        );
    }

    #[test]
    fn test_priority_items_never_dropped() {
        let diagnostics = Arc::new(Diagnostics::new());
        let queue = SignalQueue::new(2, diagnostics.clone());
        queue.push(window());
        queue.push(window());

        // No sampler signal to shed: the incoming one goes
        assert!(queue.push(video()));
        assert_eq!(queue.len(), 2);
        assert_eq!(diagnostics.snapshot().signals_dropped, 1);

        // Control items overcommit
        queue.push(QueueItem::Directive(TerminateDirective {
            attempt_id: Uuid::new_v4(),
            reason: "proctor".to_string(),
        }));
        queue.push(QueueItem::Complete);
        assert_eq!(queue.len(), 4);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = SignalQueue::new(4, Arc::new(Diagnostics::new()));
        queue.push(window());
        queue.close();

        assert!(!queue.push(window()));
        assert!(queue.is_closed());
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(SignalQueue::new(4, Arc::new(Diagnostics::new())));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        queue.push(QueueItem::Complete);
        assert_eq!(consumer.await.unwrap(), Some(QueueItem::Complete));
    }
}
