//! Bounded fan-out of async operations.
//!
//! All operations are multiplexed on the calling task; nothing is spawned, so
//! operations may borrow from the caller. On the first error the remaining
//! in-flight operations are dropped and unscheduled items never start.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Apply `operation` to every item with at most `max_in_flight` outstanding.
///
/// Results come back in completion order. A limit of 0 is treated as 1.
pub async fn run_concurrently<I, F, Fut, T, E>(
    items: I,
    max_in_flight: usize,
    operation: F,
) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(items)
        .map(operation)
        .buffer_unordered(max_in_flight.max(1))
        .try_collect()
        .await
}

/// Executor carrying the process-wide concurrency limit.
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    default_limit: usize,
}

impl BoundedExecutor {
    pub fn new(default_limit: usize) -> Self {
        Self {
            default_limit: default_limit.max(1),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Fan out with the configured limit.
    pub async fn run<I, F, Fut, T, E>(&self, items: I, operation: F) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        run_concurrently(items, self.default_limit, operation).await
    }

    /// Fan out with an explicit limit, falling back to the configured one.
    pub async fn run_with_limit<I, F, Fut, T, E>(
        &self,
        items: I,
        max_in_flight: Option<usize>,
        operation: F,
    ) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        run_concurrently(
            items,
            max_in_flight.unwrap_or(self.default_limit),
            operation,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Gauge {
        active: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
    }

    impl Gauge {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: AtomicUsize::new(0),
            }
        }

        fn enter(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let gauge = Gauge::new();
        let g = &gauge;

        let mut results = run_concurrently(0..20, 3, |i| async move {
            g.enter();
            tokio::time::sleep(Duration::from_millis(5)).await;
            g.exit();
            Ok::<_, ()>(i)
        })
        .await
        .unwrap();

        results.sort_unstable();
        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
        assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_runs_sequentially() {
        let gauge = Gauge::new();
        let g = &gauge;

        run_concurrently(0..5, 0, |_| async move {
            g.enter();
            tokio::task::yield_now().await;
            g.exit();
            Ok::<_, ()>(())
        })
        .await
        .unwrap();

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
        assert_eq!(gauge.started.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_first_failure_stops_scheduling() {
        let gauge = Gauge::new();
        let g = &gauge;

        let result = run_concurrently(0..50, 2, |i| async move {
            g.enter();
            if i == 3 {
                return Err(format!("item {i} failed"));
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            g.exit();
            Ok(i)
        })
        .await;

        assert_eq!(result.unwrap_err(), "item 3 failed");
        assert!(gauge.started.load(Ordering::SeqCst) < 50);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<u32> = run_concurrently(Vec::<u32>::new(), 4, |i| async move {
            Ok::<_, ()>(i)
        })
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_executor_limit_override() {
        let executor = BoundedExecutor::new(8);
        assert_eq!(executor.default_limit(), 8);
        assert_eq!(BoundedExecutor::new(0).default_limit(), 1);

        let gauge = Gauge::new();
        let g = &gauge;

        executor
            .run_with_limit(0..10, Some(2), |_| async move {
                g.enter();
                tokio::time::sleep(Duration::from_millis(2)).await;
                g.exit();
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    }
}
