//! Round-robin selection.
//!
//! Lock-free: an atomic counter taken modulo the size of the pool at the
//! moment of selection, so the pool may grow or shrink between calls.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the next index into a pool of `count` entries.
    ///
    /// Returns `None` if count is zero.
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(idx % count)
    }

    /// Pick the next item of `pool`.
    pub fn pick<'a, T>(&self, pool: &'a [T]) -> Option<&'a T> {
        self.next(pool.len()).map(|idx| &pool[idx])
    }

    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_indices() {
        let lb = RoundRobinBalancer::new();
        let picks: Vec<usize> = (0..5).filter_map(|_| lb.next(3)).collect();
        assert_eq!(picks, [0, 1, 2, 0, 1]);
    }

    #[test]
    fn empty_pool_returns_none() {
        let lb = RoundRobinBalancer::new();
        assert_eq!(lb.next(0), None);
        assert_eq!(lb.pick::<u8>(&[]), None);
    }

    #[test]
    fn follows_a_shrinking_pool() {
        let lb = RoundRobinBalancer::new();
        assert_eq!(lb.pick(&["a", "b", "c"]), Some(&"a"));
        assert_eq!(lb.pick(&["a", "b", "c"]), Some(&"b"));
        // One replica left the pool.
        assert_eq!(lb.pick(&["a", "c"]), Some(&"a"));
        lb.reset();
        assert_eq!(lb.pick(&["a", "c"]), Some(&"a"));
    }

    #[test]
    fn concurrent_selection_stays_in_range() {
        use std::sync::Arc;
        use std::thread;

        let lb = Arc::new(RoundRobinBalancer::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lb = lb.clone();
                thread::spawn(move || (0..100).filter_map(|_| lb.next(4)).collect::<Vec<_>>())
            })
            .collect();
        let all: Vec<usize> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(all.len(), 400);
        assert!(all.iter().all(|&idx| idx < 4));
    }
}
