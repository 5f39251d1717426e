// Bounded blocking FIFO coupling the pipeline stages.
//
// Producers block while the queue is full, consumers while it is empty. A
// shutdown signal wakes every waiter: from then on enqueue is a silent
// no-op and dequeue drains whatever is left before reporting exhaustion.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct QueueState<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        BoundedQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            capacity,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Append an item, blocking while the queue is full. Dropped silently
    /// after shutdown.
    pub fn enqueue(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        while state.items.len() == self.capacity && !state.shutdown {
            state = self.not_full.wait(state).unwrap();
        }
        if state.shutdown {
            return;
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
    }

    /// Remove the oldest item, blocking while the queue is empty. Returns
    /// `None` once the queue is both shut down and drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() && !state.shutdown {
            state = self.not_empty.wait(state).unwrap();
        }
        let item = state.items.pop_front();
        drop(state);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Signal shutdown and wake every blocked producer and consumer.
    pub fn set_shutdown(&self) {
        self.state.lock().unwrap().shutdown = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn fifo_order_single_producer() {
        let q = BoundedQueue::new(8);
        for i in 0..8 {
            q.enqueue(i);
        }
        for i in 0..8 {
            assert_eq!(q.dequeue(), Some(i));
        }
    }

    #[test]
    fn drains_then_reports_exhaustion_after_shutdown() {
        // 5 items through a capacity-3 queue, then shutdown.
        let q = Arc::new(BoundedQueue::new(3));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..5 {
                    q.enqueue(i);
                    assert!(q.len() <= 3);
                }
            })
        };
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(q.dequeue().unwrap());
        }
        producer.join().unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        q.set_shutdown();
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn enqueue_after_shutdown_is_a_no_op() {
        let q = BoundedQueue::new(2);
        q.enqueue(1);
        q.set_shutdown();
        q.enqueue(2);
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn full_queue_applies_backpressure() {
        let q = Arc::new(BoundedQueue::new(2));
        q.enqueue(0);
        q.enqueue(1);

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                q.enqueue(2); // blocks until a slot frees up
                Instant::now()
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.len(), 2);
        let freed_at = Instant::now();
        assert_eq!(q.dequeue(), Some(0));

        let third_enqueued_at = producer.join().unwrap();
        assert!(third_enqueued_at >= freed_at);
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
    }

    #[test]
    fn shutdown_wakes_blocked_consumer() {
        let q: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new(1));
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.dequeue())
        };
        thread::sleep(Duration::from_millis(50));
        q.set_shutdown();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn shutdown_wakes_blocked_producer() {
        let q = Arc::new(BoundedQueue::new(1));
        q.enqueue(1);
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.enqueue(2))
        };
        thread::sleep(Duration::from_millis(50));
        q.set_shutdown();
        producer.join().unwrap();
        assert_eq!(q.len(), 1);
    }
}
