//! Chainable pipelines over a single owned stream.
//!
//! A [`Pipeline`] wraps one live source. Deriving a pipeline (`map`,
//! `filter`, ...) or consuming it (`collect`, `fold`, ...) moves that source
//! out, so two consumers can never pull the same source. What is left behind
//! depends on [`PipeConfig`]:
//!
//! - with `move_on_chain` (the default) the original pipeline keeps a
//!   sentinel that is either empty or fails with
//!   [`StreamError::UseAfterMove`], per `err_on_move`;
//! - without it, item-preserving derivations retarget the original pipeline
//!   in place and hand back a handle to the same pipeline, and terminal
//!   operations share the current source with the pipeline without
//!   invalidating it.
//!
//! Terminal operations take their source when they are called, not when
//! their future is first polled.
//!
//! `map` and `flat` change the item type, which a typed handle cannot follow,
//! so they always move the source out regardless of `move_on_chain`.

use futures_core::Stream;
use futures_util::stream::StreamExt;
use std::fmt;
use std::fmt::Display;
use std::future::Future;
use std::iter;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use crate::combinators::{self, PipeStream};
use crate::combine::combine;
use crate::consumers;
use crate::error::{StreamError, StreamResult};
use crate::input::PipeInput;
use crate::stream_configuration::PipeConfig;

enum Slot<T> {
    Live(PipeStream<T>),
    Moved,
    MovedWithError,
}

impl<T> Slot<T>
where
    T: Send + 'static,
{
    fn sentinel(config: &PipeConfig) -> Self {
        if config.err_on_move {
            Slot::MovedWithError
        } else {
            Slot::Moved
        }
    }

    fn into_stream(self) -> PipeStream<T> {
        match self {
            Slot::Live(stream) => stream,
            Slot::Moved => combinators::empty(),
            Slot::MovedWithError => combinators::fail(StreamError::UseAfterMove),
        }
    }
}

struct Shared<T> {
    slot: Slot<T>,
    config: PipeConfig,
}

/// A chainable, move-checked wrapper around one stream
///
/// # Examples
/// ```
/// use pipe_stream::*;
///
/// # async fn example() -> StreamResult<()> {
/// let source = Pipeline::new(from_iter(vec![1, 2, 3, 4]));
/// let evens = source.filter(|x, _| x % 2 == 0);
/// assert_eq!(evens.collect().await?, vec![2, 4]);
///
/// // the source was moved into `evens`
/// assert!(source.collect().await?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Pipeline<T>
where
    T: Send + 'static,
{
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        Self::with_config(stream, PipeConfig::default())
    }

    pub fn with_config<S>(stream: S, config: PipeConfig) -> Self
    where
        S: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        Self::from_slot(Slot::Live(stream.boxed()), config)
    }

    pub fn from_input(input: PipeInput<T>) -> Self {
        Self::new(input.into_stream())
    }

    fn from_slot(slot: Slot<T>, config: PipeConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared { slot, config })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> PipeConfig {
        self.lock().config
    }

    pub fn err_on_move(&self) -> bool {
        self.lock().config.err_on_move
    }

    /// Takes effect the next time the source is moved out.
    pub fn set_err_on_move(&self, on: bool) {
        self.lock().config.err_on_move = on;
    }

    pub fn move_on_chain(&self) -> bool {
        self.lock().config.move_on_chain
    }

    pub fn set_move_on_chain(&self, on: bool) {
        self.lock().config.move_on_chain = on;
    }

    /// Whether the source has been moved out of this pipeline
    pub fn is_moved(&self) -> bool {
        !matches!(self.lock().slot, Slot::Live(_))
    }

    fn take_source(&self) -> (PipeStream<T>, PipeConfig) {
        let mut shared = self.lock();
        let config = shared.config;
        let slot = std::mem::replace(&mut shared.slot, Slot::sentinel(&config));
        log::trace!("pipeline source moved (err_on_move: {})", config.err_on_move);
        (slot.into_stream(), config)
    }

    fn chained<R, F>(&self, derive: F) -> Pipeline<R>
    where
        R: Send + 'static,
        F: FnOnce(PipeStream<T>) -> PipeStream<R>,
    {
        let (source, config) = self.take_source();
        Pipeline::from_slot(Slot::Live(derive(source)), config)
    }

    fn chained_in_place<F>(&self, derive: F) -> Pipeline<T>
    where
        F: FnOnce(PipeStream<T>) -> PipeStream<T>,
    {
        let mut shared = self.lock();
        if shared.config.move_on_chain {
            drop(shared);
            return self.chained(derive);
        }
        let current = std::mem::replace(&mut shared.slot, Slot::Moved);
        shared.slot = Slot::Live(derive(current.into_stream()));
        drop(shared);
        self.handle()
    }

    /// The stream a terminal operation drains.
    ///
    /// In place, the terminal and the pipeline share one cursor over the
    /// current source: later derivations wrap the pipeline's side only, and
    /// whatever the terminal leaves unread stays available to the pipeline.
    fn consume(&self) -> PipeStream<T> {
        let mut shared = self.lock();
        if shared.config.move_on_chain {
            drop(shared);
            return self.take_source().0;
        }
        match std::mem::replace(&mut shared.slot, Slot::Moved) {
            Slot::Live(source) => {
                let cursor = Cursor::new(source);
                shared.slot = Slot::Live(cursor.clone().boxed());
                cursor.boxed()
            }
            Slot::Moved => combinators::empty(),
            Slot::MovedWithError => {
                shared.slot = Slot::MovedWithError;
                combinators::fail(StreamError::UseAfterMove)
            }
        }
    }

    /// Read this pipeline's items without moving its source
    pub fn stream(&self) -> PipelineStream<T> {
        PipelineStream {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Move the source out, leaving the sentinel behind
    pub fn into_stream(self) -> PipeStream<T> {
        self.take_source().0
    }

    // ================================
    // Derivations
    // ================================

    pub fn filter<F>(&self, f: F) -> Pipeline<T>
    where
        F: FnMut(&T, usize) -> bool + Send + 'static,
    {
        self.chained_in_place(move |source| combinators::filter(source, f))
    }

    pub fn eval_filter<F, Fut>(&self, f: F) -> Pipeline<T>
    where
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<bool>> + Send + 'static,
    {
        self.chained_in_place(move |source| combinators::eval_filter(source, f))
    }

    /// Map every item.
    ///
    /// The item type changes, so this always moves the source into the new
    /// pipeline and leaves the sentinel behind, even when `move_on_chain` is
    /// off.
    pub fn map<R, F>(&self, f: F) -> Pipeline<R>
    where
        R: Send + 'static,
        F: FnMut(T, usize) -> R + Send + 'static,
    {
        self.chained(move |source| combinators::map(source, f))
    }

    /// Map every item asynchronously. Always moves the source, like
    /// [`map`](Pipeline::map).
    pub fn eval_map<R, F, Fut>(&self, f: F) -> Pipeline<R>
    where
        R: Send + 'static,
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<R>> + Send + 'static,
    {
        self.chained(move |source| combinators::eval_map(source, f))
    }

    pub fn take(&self, count: usize) -> Pipeline<T> {
        self.chained_in_place(move |source| combinators::take(source, count))
    }

    pub fn skip(&self, count: usize) -> Pipeline<T> {
        self.chained_in_place(move |source| combinators::skip(source, count))
    }

    pub fn peek<F>(&self, f: F) -> Pipeline<T>
    where
        F: FnMut(&T, usize) + Send + 'static,
    {
        self.chained_in_place(move |source| combinators::peek(source, f))
    }

    pub fn eval_peek<F, Fut>(&self, f: F) -> Pipeline<T>
    where
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<()>> + Send + 'static,
    {
        self.chained_in_place(move |source| combinators::eval_peek(source, f))
    }

    /// Append `next` after this pipeline's items
    pub fn chain<S>(&self, next: S) -> Pipeline<T>
    where
        S: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        let next = next.boxed();
        self.chained_in_place(move |source| combinators::chain(source, next))
    }

    /// Merge `others` into this pipeline in arrival order
    pub fn combine<I>(&self, others: I) -> Pipeline<T>
    where
        I: IntoIterator<Item = PipeStream<T>>,
    {
        self.chained_in_place(move |source| combine(iter::once(source).chain(others)))
    }

    /// Pull the first item, if any.
    ///
    /// Like every terminal below, the source is moved (or narrowed in place)
    /// when this is called, not when the returned future is first polled.
    pub fn first(&self) -> impl Future<Output = StreamResult<Option<T>>> {
        let head = self.take(1);
        async move { combinators::next(&mut head.stream()).await }
    }

    // ================================
    // Terminal operations
    // ================================

    pub fn for_each<F>(&self, f: F) -> impl Future<Output = StreamResult<()>>
    where
        F: FnMut(T, usize),
    {
        let source = self.consume();
        async move { consumers::for_each(source, f).await }
    }

    pub fn eval_for_each<F, Fut>(&self, f: F) -> impl Future<Output = StreamResult<()>>
    where
        F: FnMut(T, usize) -> Fut,
        Fut: Future<Output = StreamResult<()>>,
    {
        let source = self.consume();
        async move { consumers::eval_for_each(source, f).await }
    }

    pub fn collect(&self) -> impl Future<Output = StreamResult<Vec<T>>> {
        let source = self.consume();
        async move { consumers::collect(source).await }
    }

    pub fn collect_n(&self, count: usize) -> impl Future<Output = StreamResult<Vec<T>>> {
        let source = self.consume();
        async move { consumers::collect_n(source, count).await }
    }

    pub fn fold<R, F>(&self, init: R, f: F) -> impl Future<Output = StreamResult<R>>
    where
        F: FnMut(R, T, usize) -> R,
    {
        let source = self.consume();
        async move { consumers::fold(source, init, f).await }
    }

    pub fn eval_fold<R, F, Fut>(&self, init: R, f: F) -> impl Future<Output = StreamResult<R>>
    where
        F: FnMut(R, T, usize) -> Fut,
        Fut: Future<Output = StreamResult<R>>,
    {
        let source = self.consume();
        async move { consumers::eval_fold(source, init, f).await }
    }

    pub fn find<F>(&self, f: F) -> impl Future<Output = StreamResult<Option<(T, usize)>>>
    where
        F: FnMut(&T, usize) -> bool,
    {
        let source = self.consume();
        async move { consumers::find(source, f).await }
    }

    pub fn eval_find<F, Fut>(&self, f: F) -> impl Future<Output = StreamResult<Option<(T, usize)>>>
    where
        F: FnMut(&T, usize) -> Fut,
        Fut: Future<Output = StreamResult<bool>>,
    {
        let source = self.consume();
        async move { consumers::eval_find(source, f).await }
    }

    pub fn join(&self, separator: &str) -> impl Future<Output = StreamResult<String>>
    where
        T: Display,
    {
        let source = self.consume();
        let separator = separator.to_owned();
        async move { consumers::join(source, &separator).await }
    }
}

impl<U> Pipeline<PipeInput<U>>
where
    U: Send + 'static,
{
    /// Flatten one level of nested sequences.
    ///
    /// Always moves the source, whatever `move_on_chain` says, since the
    /// flattened pipeline has a different item type.
    pub fn flat(&self) -> Pipeline<U> {
        self.chained(combinators::flatten)
    }
}

/// A view that pulls a pipeline's current source in place.
///
/// Reading through the view does not move the source: the pipeline keeps
/// it, partially consumed, and any later derivation picks up where the view
/// stopped. A moved-from pipeline reads as empty, or as a stream of
/// [`StreamError::UseAfterMove`] when `err_on_move` was set at move time.
pub struct PipelineStream<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Stream for PipelineStream<T> {
    type Item = StreamResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut shared.slot {
            Slot::Live(source) => source.poll_next_unpin(cx),
            Slot::Moved => Poll::Ready(None),
            Slot::MovedWithError => Poll::Ready(Some(Err(StreamError::UseAfterMove))),
        }
    }
}

/// One source read from several places, each pull advancing it for all.
struct Cursor<T> {
    source: Arc<Mutex<PipeStream<T>>>,
}

impl<T> Cursor<T> {
    fn new(source: PipeStream<T>) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
        }
    }
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> Stream for Cursor<T> {
    type Item = StreamResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let state = match shared.slot {
            Slot::Live(_) => "live",
            Slot::Moved => "moved",
            Slot::MovedWithError => "moved (errors on use)",
        };
        f.debug_struct("Pipeline")
            .field("state", &state)
            .field("config", &shared.config)
            .finish()
    }
}

/// Build a pipeline from mixed inputs, merged in arrival order.
///
/// Plain values become one-element sources, sequences are used as they are
/// and deferred inputs are awaited and then flattened one level.
///
/// # Examples
/// ```
/// use pipe_stream::*;
///
/// # async fn example() -> StreamResult<()> {
/// let mut items = pipe(vec![
///     PipeInput::value(1),
///     PipeInput::stream(from_iter(vec![2, 3])),
///     PipeInput::deferred(async { Ok(PipeInput::iter(vec![4])) }),
/// ])
/// .collect()
/// .await?;
/// items.sort();
/// assert_eq!(items, vec![1, 2, 3, 4]);
/// # Ok(())
/// # }
/// ```
pub fn pipe<T, I>(inputs: I) -> Pipeline<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = PipeInput<T>>,
{
    pipe_with(inputs, PipeConfig::default())
}

/// [`pipe`] with an explicit [`PipeConfig`]
pub fn pipe_with<T, I>(inputs: I, config: PipeConfig) -> Pipeline<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = PipeInput<T>>,
{
    let sources: Vec<PipeStream<T>> = inputs.into_iter().map(PipeInput::into_stream).collect();
    Pipeline::with_config(combine(sources), config)
}

/// Extension trait turning any fallible stream into a [`Pipeline`]
pub trait PipeStreamExt<T>: Stream<Item = StreamResult<T>> + Sized + Send + 'static
where
    T: Send + 'static,
{
    fn into_pipeline(self) -> Pipeline<T> {
        Pipeline::new(self)
    }

    fn into_pipeline_with(self, config: PipeConfig) -> Pipeline<T> {
        Pipeline::with_config(self, config)
    }
}

impl<T, S> PipeStreamExt<T> for S
where
    T: Send + 'static,
    S: Stream<Item = StreamResult<T>> + Send + 'static,
{
}
