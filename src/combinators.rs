//! Lazy stream combinators
//!
//! Every function here takes ownership of its input stream(s) and returns a
//! new [`PipeStream`] that does no work until it is first polled. Items are
//! pulled one at a time on demand; nothing is buffered ahead of the consumer.
//!
//! Callback-taking combinators come in pairs: a synchronous, infallible form
//! (`map`, `filter`, `peek`) and an asynchronous, fallible `eval_` form whose
//! callback returns a future of [`StreamResult`]. Either way the callback also
//! receives the item's input position.

use async_stream::stream;
use futures::future;
use futures_core::Stream;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{StreamError, StreamResult};
use crate::input::PipeInput;

/// A boxed, fallible stream. An `Err` item is always the last item.
pub type PipeStream<T> = BoxStream<'static, StreamResult<T>>;

// ================================
// Sources
// ================================

/// Create a stream that completes immediately
pub fn empty<T>() -> PipeStream<T>
where
    T: Send + 'static,
{
    stream::empty().boxed()
}

/// Emit a single element
pub fn emit<T>(item: T) -> PipeStream<T>
where
    T: Send + 'static,
{
    stream::once(future::ready(Ok(item))).boxed()
}

/// A stream whose only item is `err`
pub fn fail<T>(err: StreamError) -> PipeStream<T>
where
    T: Send + 'static,
{
    stream::once(future::ready(Err(err))).boxed()
}

/// Create a stream from plain values. The stream never suspends.
pub fn from_iter<I, T>(iter: I) -> PipeStream<T>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    stream::iter(iter.into_iter().map(Ok)).boxed()
}

/// Create a stream from deferred values, awaiting each one in order before
/// yielding it. A failed future ends the stream.
pub fn from_futures<I, F, T>(iter: I) -> PipeStream<T>
where
    I: IntoIterator<Item = F>,
    I::IntoIter: Send + 'static,
    F: Future<Output = StreamResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let pending = iter.into_iter();
    stream! {
        for fut in pending {
            match fut.await {
                Ok(item) => yield Ok(item),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// A single-element stream yielding the output of `fut`
pub fn from_future<F, T>(fut: F) -> PipeStream<T>
where
    F: Future<Output = StreamResult<T>> + Send + 'static,
    T: Send + 'static,
{
    stream::once(fut).boxed()
}

/// Attach a release hook to `stream`.
///
/// The hook runs exactly once if the stream is dropped before it reports
/// exhaustion, and never if it was drained. It is called synchronously from
/// `Drop` and nothing waits on whatever work it starts.
pub fn with_release<T, F>(stream: PipeStream<T>, release: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: FnOnce() + Send + 'static,
{
    Released {
        stream,
        release: Some(Box::new(release)),
    }
    .boxed()
}

struct Released<T> {
    stream: PipeStream<T>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Stream for Released<T> {
    type Item = StreamResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.stream.poll_next_unpin(cx);
        if let Poll::Ready(None) = polled {
            // drained sources need no release
            self.release = None;
        }
        polled
    }
}

impl<T> Drop for Released<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            log::trace!("releasing source before exhaustion");
            release();
        }
    }
}

/// Pull exactly one item from any stream.
///
/// Returns `Ok(None)` once the stream is exhausted.
pub async fn next<S, T>(stream: &mut S) -> StreamResult<Option<T>>
where
    S: Stream<Item = StreamResult<T>> + Unpin,
{
    stream.next().await.transpose()
}

// ================================
// Stream Transformations
// ================================

/// Pair every item with its position, starting at 0
pub fn enumerate<T>(stream: PipeStream<T>) -> PipeStream<(T, usize)>
where
    T: Send + 'static,
{
    stream! {
        let mut stream = stream;
        let mut idx = 0usize;
        while let Some(next) = stream.next().await {
            match next {
                Ok(item) => {
                    yield Ok((item, idx));
                    idx += 1;
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// Map every item with a synchronous function
pub fn map<T, R, F>(stream: PipeStream<T>, mut f: F) -> PipeStream<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnMut(T, usize) -> R + Send + 'static,
{
    eval_map(stream, move |item, idx| future::ready(Ok(f(item, idx))))
}

/// Map every item with an asynchronous, fallible function.
///
/// Each call is awaited before the next item is pulled, so output order is
/// input order. The first `Err` is yielded and ends the stream.
///
/// # Examples
/// ```
/// use pipe_stream::*;
///
/// # async fn example() -> StreamResult<()> {
/// let shifted = eval_map(from_iter(vec![1, 2, 3]), |x, idx| async move { Ok(x + idx) });
/// assert_eq!(collect(shifted).await?, vec![1, 3, 5]);
/// # Ok(())
/// # }
/// ```
pub fn eval_map<T, R, F, Fut>(stream: PipeStream<T>, mut f: F) -> PipeStream<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<R>> + Send + 'static,
{
    stream! {
        let mut items = enumerate(stream);
        while let Some(next) = items.next().await {
            let (item, idx) = match next {
                Ok(pair) => pair,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            match f(item, idx).await {
                Ok(out) => yield Ok(out),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// Keep the items for which `f` returns true
pub fn filter<T, F>(stream: PipeStream<T>, mut f: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> bool + Send + 'static,
{
    eval_filter(stream, move |item, idx| future::ready(Ok(f(item, idx))))
}

/// Keep the items for which the asynchronous predicate resolves to true.
///
/// The position handed to `f` is the item's input position, not its position
/// among the kept items.
pub fn eval_filter<T, F, Fut>(stream: PipeStream<T>, mut f: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<bool>> + Send + 'static,
{
    stream! {
        let mut items = enumerate(stream);
        while let Some(next) = items.next().await {
            let (item, idx) = match next {
                Ok(pair) => pair,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            match f(&item, idx).await {
                Ok(true) => yield Ok(item),
                Ok(false) => {}
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// Yield at most `count` items.
///
/// The input is never pulled past the `count`th item, and not at all when
/// `count` is 0.
pub fn take<T>(stream: PipeStream<T>, count: usize) -> PipeStream<T>
where
    T: Send + 'static,
{
    stream! {
        let mut stream = stream;
        let mut taken = 0usize;
        while taken < count {
            match stream.next().await {
                Some(Ok(item)) => {
                    taken += 1;
                    yield Ok(item);
                }
                Some(Err(e)) => {
                    yield Err(e);
                    break;
                }
                None => break,
            }
        }
    }
    .boxed()
}

/// Discard the first `count` items
pub fn skip<T>(stream: PipeStream<T>, count: usize) -> PipeStream<T>
where
    T: Send + 'static,
{
    stream! {
        let mut items = enumerate(stream);
        while let Some(next) = items.next().await {
            match next {
                Ok((item, idx)) => {
                    if idx >= count {
                        yield Ok(item);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// Observe every item without changing it
pub fn peek<T, F>(stream: PipeStream<T>, mut f: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) + Send + 'static,
{
    eval_peek(stream, move |item, idx| {
        f(item, idx);
        future::ready(Ok(()))
    })
}

/// Observe every item with an asynchronous side effect, awaited before the
/// item is passed on
pub fn eval_peek<T, F, Fut>(stream: PipeStream<T>, mut f: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
{
    stream! {
        let mut items = enumerate(stream);
        while let Some(next) = items.next().await {
            let (item, idx) = match next {
                Ok(pair) => pair,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            match f(&item, idx).await {
                Ok(()) => yield Ok(item),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// Flatten one level.
///
/// Sequence items contribute each of their elements, plain values are
/// yielded as they are, and deferred items are awaited and then treated like
/// whatever they resolved to.
pub fn flatten<T>(stream: PipeStream<PipeInput<T>>) -> PipeStream<T>
where
    T: Send + 'static,
{
    stream! {
        let mut outer = stream;
        while let Some(next) = outer.next().await {
            let input = match next {
                Ok(input) => input,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            let mut inner = input.into_stream();
            let mut failed = false;
            while let Some(sub) = inner.next().await {
                match sub {
                    Ok(item) => yield Ok(item),
                    Err(e) => {
                        yield Err(e);
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                break;
            }
        }
    }
    .boxed()
}

/// Yield everything from `first`, then everything from `second`.
///
/// `second` is not touched if `first` fails.
pub fn chain<T>(first: PipeStream<T>, second: PipeStream<T>) -> PipeStream<T>
where
    T: Send + 'static,
{
    stream! {
        let mut first = first;
        let mut failed = false;
        while let Some(next) = first.next().await {
            match next {
                Ok(item) => yield Ok(item),
                Err(e) => {
                    yield Err(e);
                    failed = true;
                    break;
                }
            }
        }
        drop(first);

        if !failed {
            let mut second = second;
            while let Some(next) = second.next().await {
                match next {
                    Ok(item) => yield Ok(item),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
    .boxed()
}
