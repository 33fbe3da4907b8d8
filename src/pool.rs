//! Bounded admission window for concurrent fetches.

use std::future::Future;

use futures::{Stream, StreamExt, stream};

/// Runs `f` over `items` with at most `limit` futures in flight.
///
/// Futures start in item order. As soon as any in-flight future resolves,
/// the next item is admitted; results are yielded in completion order.
/// A `limit` of zero is treated as one.
pub fn run_bounded<I, F, Fut>(items: I, limit: usize, f: F) -> impl Stream<Item = Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    stream::iter(items).map(f).buffer_unordered(limit.max(1))
}
