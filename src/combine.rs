//! Merging many sources into one stream in arrival order.
//!
//! [`Combine`] keeps exactly one outstanding request per live source and
//! races them. Whichever source produces first is emitted and immediately
//! asked for its next item, so a fast source is never held back by a slow
//! one. Items from a single source keep their relative order; across sources
//! there is no ordering guarantee.
//!
//! Dropping a `Combine` before it is exhausted drops every source that has
//! not finished yet, which is what triggers release hooks attached with
//! [`with_release`](crate::combinators::with_release). A failure from any
//! source is yielded and ends the merge, releasing the rest the same way.

use async_stream::stream;
use futures::ready;
use futures::stream::FuturesUnordered;
use futures_core::Stream;
use futures_util::stream::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::combinators::PipeStream;
use crate::error::StreamResult;

/// Merge `sources` into one stream, first ready first out
///
/// # Examples
/// ```
/// use pipe_stream::*;
///
/// # async fn example() -> StreamResult<()> {
/// let merged = combine(vec![from_iter(vec![1, 2]), from_iter(vec![3])]);
/// let mut items = collect(merged).await?;
/// items.sort();
/// assert_eq!(items, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub fn combine<T, I>(sources: I) -> PipeStream<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = PipeStream<T>>,
{
    Combine::new(sources).boxed()
}

/// Merge a list of sources that is itself produced later.
///
/// The future is awaited on first poll. If it fails, its error is the only
/// item.
pub fn combine_deferred<T, F>(sources: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: Future<Output = StreamResult<Vec<PipeStream<T>>>> + Send + 'static,
{
    stream! {
        match sources.await {
            Ok(sources) => {
                let mut merged = Combine::new(sources);
                while let Some(item) = merged.next().await {
                    yield item;
                }
            }
            Err(e) => yield Err(e),
        }
    }
    .boxed()
}

/// One outstanding "next item" request against a source. Resolves with the
/// source's index, what it produced and the source itself so it can be asked
/// again.
struct Request<T> {
    index: usize,
    source: Option<PipeStream<T>>,
}

impl<T> Request<T> {
    fn new(index: usize, source: PipeStream<T>) -> Self {
        Self {
            index,
            source: Some(source),
        }
    }
}

impl<T> Future for Request<T> {
    type Output = (usize, Option<StreamResult<T>>, PipeStream<T>);

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // FuturesUnordered drops a request once it resolves and never polls
        // it again, so the source is always here
        let Some(mut source) = self.source.take() else {
            return Poll::Pending;
        };
        match source.poll_next_unpin(cx) {
            Poll::Ready(item) => Poll::Ready((self.index, item, source)),
            Poll::Pending => {
                self.source = Some(source);
                Poll::Pending
            }
        }
    }
}

/// Stream returned by [`combine`]
pub struct Combine<T> {
    pending: FuturesUnordered<Request<T>>,
    completed: Vec<bool>,
    live: usize,
}

impl<T> Combine<T> {
    pub fn new<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = PipeStream<T>>,
    {
        let pending: FuturesUnordered<_> = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| Request::new(index, source))
            .collect();
        let live = pending.len();
        Self {
            pending,
            completed: vec![false; live],
            live,
        }
    }

    /// Number of sources that have not finished yet
    pub fn live(&self) -> usize {
        self.live
    }

    /// Whether the source at `index` ran to exhaustion
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.get(index).copied().unwrap_or(false)
    }

    fn release_live(&mut self) {
        // dropping the outstanding requests drops their sources
        self.pending = FuturesUnordered::new();
        self.live = 0;
    }
}

impl<T> Stream for Combine<T> {
    type Item = StreamResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.live == 0 {
                return Poll::Ready(None);
            }
            match ready!(this.pending.poll_next_unpin(cx)) {
                Some((index, Some(Ok(item)), source)) => {
                    this.pending.push(Request::new(index, source));
                    return Poll::Ready(Some(Ok(item)));
                }
                Some((index, Some(Err(err)), _)) => {
                    log::debug!(
                        "combine: source {} failed, releasing {} other live source(s)",
                        index,
                        this.live - 1
                    );
                    this.release_live();
                    return Poll::Ready(Some(Err(err)));
                }
                Some((index, None, _)) => {
                    debug_assert!(!this.completed[index], "source completed twice");
                    this.completed[index] = true;
                    this.live -= 1;
                    log::trace!("combine: source {} exhausted, {} live", index, this.live);
                }
                None => {
                    this.live = 0;
                    return Poll::Ready(None);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.live == 0 {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

impl<T> Drop for Combine<T> {
    fn drop(&mut self) {
        if self.live > 0 {
            log::debug!("combine: abandoned, releasing {} live source(s)", self.live);
            self.release_live();
        }
    }
}
