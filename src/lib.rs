//! # `futura`: futures resolved by background threads
//!
//! This crate implements a small promise library. A [Future](future::Future)
//! is a handle to a value that a background task is computing. Futures can be
//! chained with continuations, gathered in bulk, delayed and raced against
//! deadlines, and they report failure the way a panic would: a callback that
//! panics fails its future, the failure flows down the chain until something
//! handles it, and [join](future::Future::join) raises it again in the caller.
//!
//! Background work runs on an [Executor](task::Executor): by default a thread
//! per task, optionally a fixed pool of workers. See the [task] module for how
//! tasks are executed, the [future] module for what can be built out of them,
//! and the [error] module for how failures are described.
//!
//! ## Example
//!
//! Fetch a few values concurrently, combine them, and recover from one kind of
//! failure:
//!
//! ```
//! use futura::error::{Error, ErrorKind};
//! use futura::future::Future;
//! use std::time::Duration;
//!
//! let prices = Future::wait([
//!     Future::delay(|| 3u32, Duration::from_millis(20)),
//!     Future::delay(|| 4u32, Duration::from_millis(10)),
//!     Future::value(5u32),
//! ]);
//!
//! let total = prices
//!     .then(|prices| prices.iter().sum::<u32>())
//!     .catch(ErrorKind::Aggregate, |err| eprintln!("some prices missing: {err}"));
//!
//! assert_eq!(total.join(), 12);
//!
//! let unreachable = Future::<u32>::timeout(
//!     || Error::custom("net", "host unreachable").raise(),
//!     Duration::from_secs(1),
//! );
//! assert_eq!(unreachable.try_join().unwrap_err().kind(), ErrorKind::Custom("net"));
//! ```
pub mod error;
pub mod future;
pub mod sync;
pub mod task;
pub mod trap;

pub use error::{Error, ErrorKind, Result};
pub use future::Future;
pub use task::{Config, Executor};
