//! Batch Tools


use futures_util::stream::{self, StreamExt};

/// Run async operations with at most `concurrency` in flight.
///
/// Results come back in input order regardless of completion order.
/// A `concurrency` of 0 is treated as 1.
pub async fn batch<T, F, Fut, R>(items: Vec<T>, concurrency: usize, operation: F) -> Vec<R>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let mut indexed: Vec<(usize, R)> = stream::iter(items.into_iter().enumerate())
        .map(|(idx, item)| {
            let fut = operation(item);
            async move { (idx, fut.await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, r)| r).collect()
}
