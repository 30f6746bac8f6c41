use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// FIFO probed by parity: even input is pushed and echoed, odd input pops the
/// front (or yields `0` when empty).
///
/// Each probe holds the lock for its whole push/pop, so concurrent callers see
/// a consistent queue. There is no capacity bound.
#[derive(Debug, Default)]
pub struct ParityQueue {
    inner: Mutex<VecDeque<i64>>,
}

impl ParityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self, number: i64) -> i64 {
        // A poisoned guard still holds a valid deque; keep serving it.
        let mut q = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if number == 2 || number % 2 == 0 {
            q.push_back(number);
            number
        } else {
            q.pop_front().unwrap_or(0)
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop() {
        let q = ParityQueue::new();
        assert_eq!(q.probe(4), 4);
        assert_eq!(q.probe(1), 4);
        assert_eq!(q.probe(3), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn fifo_order_and_negative_numbers() {
        let q = ParityQueue::new();
        assert_eq!(q.probe(-4), -4);
        assert_eq!(q.probe(0), 0);
        assert_eq!(q.probe(2), 2);
        assert_eq!(q.len(), 3);

        assert_eq!(q.probe(-1), -4);
        assert_eq!(q.probe(5), 0); // the pushed zero
        assert_eq!(q.probe(7), 2);
        assert_eq!(q.probe(9), 0); // empty
    }

    #[test]
    fn concurrent_probes_keep_count() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(ParityQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..1000 {
                        q.probe(i * 2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), 8000);
    }
}
