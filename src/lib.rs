//! Lazy, pull-based stream combinators.
//!
//! Sources may be plain values, synchronous iterators, asynchronous streams
//! or deferred computations ([`PipeInput`]). Combinators ([`combinators`])
//! transform one stream into another without doing any work until pulled,
//! [`combine`](combine()) merges many sources in arrival order, and
//! [`consumers`] drive a stream to a result. [`Pipeline`] wraps all of it in
//! a chainable object that tracks who owns the underlying source.
//!
//! ```
//! use pipe_stream::*;
//!
//! # async fn example() -> StreamResult<()> {
//! let total = pipe(vec![PipeInput::iter(vec![1, 2, 3]), PipeInput::value(4)])
//!     .map(|x, _| x * 10)
//!     .fold(0, |acc, x, _| acc + x)
//!     .await?;
//! assert_eq!(total, 100);
//! # Ok(())
//! # }
//! ```

pub mod combinators;
pub mod combine;
pub mod consumers;
pub mod error;
pub mod input;
pub mod pipe;
pub mod stream_configuration;

pub use combinators::*;
pub use combine::{combine, combine_deferred, Combine};
pub use consumers::*;
pub use error::{StreamError, StreamResult};
pub use input::PipeInput;
pub use pipe::{pipe, pipe_with, PipeStreamExt, Pipeline, PipelineStream};
pub use stream_configuration::PipeConfig;
