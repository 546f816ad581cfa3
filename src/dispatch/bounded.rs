//! Chunked bounded-concurrency execution.
//!
//! Items are taken `limit` at a time; each chunk runs concurrently and the
//! next chunk starts only once every future in the current one has
//! resolved. In-flight work never exceeds `limit`.

use futures::future::join_all;
use std::future::Future;
use tracing::debug;

/// Run `op` over `items`, `limit` at a time, returning results in input order.
///
/// A `limit` of zero is treated as one.
pub async fn run_chunked<T, R, F, Fut>(items: Vec<T>, limit: usize, mut op: F) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let limit = limit.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();
    let mut chunk_index = 0usize;

    while items.peek().is_some() {
        let chunk: Vec<Fut> = items.by_ref().take(limit).map(&mut op).collect();
        debug!(chunk = chunk_index, size = chunk.len(), "chunk started");
        results.extend(join_all(chunk).await);
        chunk_index += 1;
    }

    results
}
