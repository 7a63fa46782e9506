use async_trait::async_trait;
use seqlink_core::counter::{Result, SequenceCounter, SequenceNumber};
use seqlink_core::CounterError;
use std::sync::atomic::{AtomicU64, Ordering};

/// A process-local sequence counter.
///
/// Issuance is a single atomic read-modify-write, so concurrent callers
/// never observe the same value. State is lost on restart; use
/// [`with_offset`](Self::with_offset) to resume from a value recorded
/// elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryCounter {
    next: AtomicU64,
}

impl InMemoryCounter {
    /// Creates a counter that starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter whose first issued value is `offset`.
    pub fn with_offset(offset: SequenceNumber) -> Self {
        Self {
            next: AtomicU64::new(offset),
        }
    }
}

#[async_trait]
impl SequenceCounter for InMemoryCounter {
    async fn next(&self) -> Result<SequenceNumber> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| CounterError::Exhausted)
    }

    async fn peek(&self) -> Result<SequenceNumber> {
        Ok(self.next.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn issues_sequential_values_from_zero() {
        let counter = InMemoryCounter::new();

        assert_eq!(counter.next().await.unwrap(), 0);
        assert_eq!(counter.next().await.unwrap(), 1);
        assert_eq!(counter.next().await.unwrap(), 2);
        assert_eq!(counter.peek().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let counter = InMemoryCounter::new();

        assert_eq!(counter.peek().await.unwrap(), 0);
        assert_eq!(counter.peek().await.unwrap(), 0);
        assert_eq!(counter.next().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resumes_from_offset() {
        let counter = InMemoryCounter::with_offset(1000);

        assert_eq!(counter.next().await.unwrap(), 1000);
        assert_eq!(counter.next().await.unwrap(), 1001);
    }

    #[tokio::test]
    async fn exhausted_counter_fails_without_wrapping() {
        let counter = InMemoryCounter::with_offset(u64::MAX);

        assert_eq!(counter.next().await, Err(CounterError::Exhausted));
        assert_eq!(counter.peek().await.unwrap(), u64::MAX);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_never_share_a_value() {
        let counter = Arc::new(InMemoryCounter::new());
        let mut handles = vec![];

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let mut issued = Vec::with_capacity(250);
                for _ in 0..250 {
                    issued.push(counter.next().await.unwrap());
                }
                issued
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.await.unwrap() {
                assert!(seen.insert(value), "value {value} issued twice");
            }
        }

        // no gaps either
        assert_eq!(seen.len(), 4000);
        assert!(seen.iter().all(|&v| v < 4000));
        assert_eq!(counter.peek().await.unwrap(), 4000);
    }

    #[test]
    fn counter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InMemoryCounter>();
    }
}
