//! Terminal consumers: drive a stream and return an aggregate.
//!
//! All of these stop at the first `Err` item and return it. A consumer that
//! stops early (`find`, `collect_n`) drops the rest of the stream.

use futures::future;
use futures_util::stream::StreamExt;
use std::fmt::Display;
use std::future::Future;

use crate::combinators::{enumerate, take, PipeStream};
use crate::error::StreamResult;

/// Run `f` on every item
pub async fn for_each<T, F>(stream: PipeStream<T>, mut f: F) -> StreamResult<()>
where
    T: Send + 'static,
    F: FnMut(T, usize),
{
    eval_for_each(stream, move |item, idx| {
        f(item, idx);
        future::ready(Ok(()))
    })
    .await
}

/// Run an asynchronous, fallible `f` on every item, one at a time
pub async fn eval_for_each<T, F, Fut>(stream: PipeStream<T>, mut f: F) -> StreamResult<()>
where
    T: Send + 'static,
    F: FnMut(T, usize) -> Fut,
    Fut: Future<Output = StreamResult<()>>,
{
    let mut items = enumerate(stream);
    while let Some(next) = items.next().await {
        let (item, idx) = next?;
        f(item, idx).await?;
    }
    Ok(())
}

/// Collect every item into a `Vec`
pub async fn collect<T>(stream: PipeStream<T>) -> StreamResult<Vec<T>>
where
    T: Send + 'static,
{
    let mut stream = stream;
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        out.push(item?);
    }
    Ok(out)
}

/// Collect at most `count` items
pub async fn collect_n<T>(stream: PipeStream<T>, count: usize) -> StreamResult<Vec<T>>
where
    T: Send + 'static,
{
    collect(take(stream, count)).await
}

/// Fold every item into an accumulator
pub async fn fold<T, R, F>(stream: PipeStream<T>, init: R, mut f: F) -> StreamResult<R>
where
    T: Send + 'static,
    F: FnMut(R, T, usize) -> R,
{
    eval_fold(stream, init, move |acc, item, idx| future::ready(Ok(f(acc, item, idx)))).await
}

/// Fold with an asynchronous, fallible step
pub async fn eval_fold<T, R, F, Fut>(stream: PipeStream<T>, init: R, mut f: F) -> StreamResult<R>
where
    T: Send + 'static,
    F: FnMut(R, T, usize) -> Fut,
    Fut: Future<Output = StreamResult<R>>,
{
    let mut acc = init;
    let mut items = enumerate(stream);
    while let Some(next) = items.next().await {
        let (item, idx) = next?;
        acc = f(acc, item, idx).await?;
    }
    Ok(acc)
}

/// First item matching `f`, with its position
pub async fn find<T, F>(stream: PipeStream<T>, mut f: F) -> StreamResult<Option<(T, usize)>>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> bool,
{
    eval_find(stream, move |item, idx| future::ready(Ok(f(item, idx)))).await
}

/// First item matching an asynchronous predicate, with its position.
///
/// The stream is dropped as soon as a match is found.
pub async fn eval_find<T, F, Fut>(
    stream: PipeStream<T>,
    mut f: F,
) -> StreamResult<Option<(T, usize)>>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut,
    Fut: Future<Output = StreamResult<bool>>,
{
    let mut items = enumerate(stream);
    while let Some(next) = items.next().await {
        let (item, idx) = next?;
        if f(&item, idx).await? {
            return Ok(Some((item, idx)));
        }
    }
    Ok(None)
}

/// Concatenate the display form of every item, separated by `separator`
///
/// # Examples
/// ```
/// use pipe_stream::*;
///
/// # async fn example() -> StreamResult<()> {
/// let joined = join(from_iter(vec!["a", "b", "c"]), "-").await?;
/// assert_eq!(joined, "a-b-c");
/// # Ok(())
/// # }
/// ```
pub async fn join<T>(stream: PipeStream<T>, separator: &str) -> StreamResult<String>
where
    T: Display + Send + 'static,
{
    fold(stream, String::new(), |mut out, item, idx| {
        if idx > 0 {
            out.push_str(separator);
        }
        out.push_str(&item.to_string());
        out
    })
    .await
}
