//! Capability-tagged inputs.
//!
//! Values from outside the crate are classified once, when a [`PipeInput`]
//! is built, as a plain value, a synchronous sequence, an asynchronous
//! sequence or a deferred computation. Everything downstream matches on the
//! tag instead of probing the value again.

use futures::future::BoxFuture;
use futures::FutureExt;
use futures_core::Stream;
use futures_util::stream::StreamExt;
use std::fmt;
use std::future::Future;

use async_stream::stream;

use crate::combinators::{emit, from_iter, PipeStream};
use crate::error::StreamResult;

/// An input to a pipeline, tagged by capability
pub enum PipeInput<T> {
    /// A single plain value
    Value(T),
    /// A synchronous sequence; pulling it never suspends
    Iter(Box<dyn Iterator<Item = T> + Send>),
    /// An asynchronous sequence
    Stream(PipeStream<T>),
    /// A computation that resolves to another input later
    Deferred(BoxFuture<'static, StreamResult<PipeInput<T>>>),
}

impl<T> PipeInput<T>
where
    T: Send + 'static,
{
    pub fn value(value: T) -> Self {
        PipeInput::Value(value)
    }

    pub fn iter<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        PipeInput::Iter(Box::new(values.into_iter()))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        PipeInput::Stream(stream.boxed())
    }

    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = StreamResult<PipeInput<T>>> + Send + 'static,
    {
        PipeInput::Deferred(fut.boxed())
    }

    pub fn is_sync_sequence(&self) -> bool {
        matches!(self, PipeInput::Iter(_))
    }

    pub fn is_async_sequence(&self) -> bool {
        matches!(self, PipeInput::Stream(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, PipeInput::Deferred(_))
    }

    /// Lower this input into a stream.
    ///
    /// A value becomes a one-element stream and sequences are passed through.
    /// A deferred input is awaited on first poll and its resolution is lowered
    /// the same way.
    pub fn into_stream(self) -> PipeStream<T> {
        match self {
            PipeInput::Value(value) => emit(value),
            PipeInput::Iter(values) => from_iter(values),
            PipeInput::Stream(stream) => stream,
            PipeInput::Deferred(fut) => stream! {
                match fut.await {
                    Ok(resolved) => {
                        let mut inner = resolved.into_stream();
                        while let Some(item) = inner.next().await {
                            yield item;
                        }
                    }
                    Err(e) => yield Err(e),
                }
            }
            .boxed(),
        }
    }
}

impl<T> From<Vec<T>> for PipeInput<T>
where
    T: Send + 'static,
{
    fn from(values: Vec<T>) -> Self {
        PipeInput::iter(values)
    }
}

impl<T> From<PipeStream<T>> for PipeInput<T> {
    fn from(stream: PipeStream<T>) -> Self {
        PipeInput::Stream(stream)
    }
}

impl<T: fmt::Debug> fmt::Debug for PipeInput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeInput::Value(value) => f.debug_tuple("Value").field(value).finish(),
            PipeInput::Iter(_) => f.write_str("Iter(..)"),
            PipeInput::Stream(_) => f.write_str("Stream(..)"),
            PipeInput::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
