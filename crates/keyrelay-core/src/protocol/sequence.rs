//! Sequence ids for key occurrences.
//!
//! Every key message that enters the dispatcher gets an id, and every answer
//! a delegate sends back names the id it answers. The ids must therefore
//! never repeat while an occurrence may still be pending; a 64-bit counter
//! that starts at 1 gives that for any realistic session.
//!
//! The counter is atomic so a pipeline can be shared behind an `Arc` by
//! hosts that construct it on one thread and pump it on another.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id source. The first id handed out is 1; 0 is never used.
#[derive(Debug)]
pub struct SequenceCounter {
    last: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id.
    ///
    /// Skips 0 on wrap-around so "no id" can keep meaning 0 in diagnostics.
    pub fn next(&self) -> u64 {
        let id = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if id == 0 {
            self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
        } else {
            id
        }
    }

    /// The most recently issued id, 0 before the first call to [`next`](Self::next).
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_id_is_one() {
        // Arrange
        let counter = SequenceCounter::new();

        // Act
        let first = counter.next();

        // Assert
        assert_eq!(first, 1);
        assert_eq!(counter.last_issued(), 1);
    }

    #[test]
    fn test_zero_is_skipped_on_wrap() {
        // Arrange – one step before the counter wraps
        let counter = SequenceCounter {
            last: AtomicU64::new(u64::MAX - 1),
        };

        // Act
        let max = counter.next();
        let after_wrap = counter.next();

        // Assert
        assert_eq!(max, u64::MAX);
        assert_eq!(after_wrap, 1);
    }

    #[test]
    fn test_ids_are_unique_across_threads() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || (0..500).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 2000);
        assert!(!ids.contains(&0));
    }
}
