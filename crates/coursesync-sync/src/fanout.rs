//! Bounded fan-out over independent branches
//!
//! Each branch returns its own value; the caller appends results from a
//! single task, so no shared state is touched concurrently. Output order
//! matches input order.
//!
//! The width bounds how many branches run at once at one level. The
//! global request ceiling is enforced separately by
//! [`RemoteSource`](crate::source::RemoteSource), so nested fan-outs cannot
//! multiply the number of requests in flight.

use std::future::Future;

use futures_util::stream::{self, StreamExt, TryStreamExt};

/// Runs `f` over `items` with at most `width` futures in flight
pub async fn fan_out<I, F, Fut, T>(width: usize, items: I, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffered(width.max(1))
        .collect()
        .await
}

/// Like [`fan_out`], but stops at the first `Err`
///
/// Remaining branches are dropped without side effects, since a branch
/// only ever returns a value.
pub async fn try_fan_out<I, F, Fut, T, E>(width: usize, items: I, f: F) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(items)
        .map(f)
        .buffered(width.max(1))
        .try_collect()
        .await
}
