//! Bounded fan-out of independent channel operations

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::ChannelError;

/// Concurrency cap for bulk operations across teams
pub const MAX_CONCURRENT_OPS: usize = 50;

/// Run `op` for every item with at most `limit` in flight.
///
/// Results come back in input order. A panicking operation is reported as a
/// [`ChannelError::Backend`] for its item.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    op: F,
) -> Vec<Result<R, ChannelError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, ChannelError>> + Send + 'static,
{
    debug!(count = items.len(), limit, "running bounded fan-out");
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push(Err(ChannelError::Backend(e.to_string())));
                continue;
            }
        };
        let fut = op(item);
        handles.push(Ok(tokio::spawn(async move {
            let result = fut.await;
            drop(permit);
            result
        })));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle {
            Ok(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(ChannelError::Backend(format!("task panicked: {}", e))),
            },
            Err(e) => Err(e),
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_in_input_order() {
        let results = run_bounded((0..10).collect(), 3, |i: u32| async move {
            tokio::time::sleep(Duration::from_millis(u64::from(10 - i))).await;
            Ok(i * 2)
        })
        .await;
        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded((0..20).collect(), 4, |_: u32| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_errors_are_per_item() {
        let results = run_bounded(vec![1, 2, 3], 2, |i: u32| async move {
            if i == 2 {
                Err(ChannelError::KvStore("boom".to_string()))
            } else {
                Ok(i)
            }
        })
        .await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
