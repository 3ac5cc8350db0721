//! Futures: values computed in the background.
//!
//! A [Future] is a handle to the outcome of a background task. It starts out
//! pending and is resolved exactly once, either with a value or with an
//! [Error]. After that it never changes and can be joined any number of times,
//! from any number of threads.
//!
//! Futures are built by the constructors ([Future::spawn], [Future::value],
//! [Future::timeout], [Future::delay], ...), chained with the combinators
//! ([Future::then], [Future::catch], [Future::complete], ...) and gathered
//! with the aggregators ([Future::wait], [Future::foreach], ...). Every one of
//! them launches a new background task; none of them blocks the caller.
//!
//! # Example
//!
//! ```
//! use futura::future::Future;
//!
//! let x = Future::spawn(|| 1)
//!     .then(|x| x + 1)
//!     .then(|x| x + 1)
//!     .join();
//!
//! assert_eq!(x, 3);
//! ```
//!
//! # Failure
//!
//! A callback fails its future by panicking. The panic is caught and stored;
//! it propagates down a chain until a combinator handles it, and is raised
//! again, as a panic carrying the same [Error], by [Future::join]. Use
//! [Future::try_join] to get it as a [Result] instead.
//!
//! ```
//! use futura::{error::ErrorKind, future::Future};
//!
//! let f = Future::spawn(|| -> u32 { panic!("boom") }).then(|x| x * 2);
//!
//! let err = f.try_join().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Panicked);
//! assert_eq!(err.to_string(), "callback panicked: boom");
//! ```
use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};

use log::{trace, warn};

use crate::{
    error::{Error, Result},
    sync::signal::Signal,
    task::Executor,
    trap::trap_result,
};

mod aggregate;
mod combinators;
mod construct;
mod join;

pub use join::Join;

struct Inner<T> {
    outcome: OnceLock<Result<T>>,
    signal: Signal,
    executor: Executor,
}

impl<T> Inner<T> {
    fn resolve(&self, outcome: Result<T>) -> bool {
        if self.outcome.set(outcome).is_err() {
            return false;
        }

        trace!("future resolved");

        self.signal.fire()
    }
}

/// A handle to a value produced by a background task.
///
/// Cloning the handle is cheap; all clones observe the same outcome. See the
/// [module-level documentation](self) for more information.
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

/// The write side of a future.
///
/// Whoever owns the resolver is the only party that decides the future's
/// outcome. If the resolver is dropped without resolving, for instance because
/// its task never got to run, the future fails with
/// [Abandoned](crate::error::ErrorKind::Abandoned), so nobody waits forever.
pub(crate) struct Resolver<T> {
    inner: Option<Arc<Inner<T>>>,
}

impl<T> Resolver<T> {
    pub(crate) fn resolve(mut self, outcome: Result<T>) {
        if let Some(inner) = self.inner.take() {
            inner.resolve(outcome);
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            warn!("future abandoned before it resolved");
            inner.resolve(Err(Error::Abandoned));
        }
    }
}

impl<T> Future<T> {
    /// A pending future and the resolver that completes it.
    pub(crate) fn pending(executor: Executor) -> (Self, Resolver<T>) {
        let inner = Arc::new(Inner {
            outcome: OnceLock::new(),
            signal: Signal::new(),
            executor,
        });

        let resolver = Resolver {
            inner: Some(inner.clone()),
        };

        (Self { inner }, resolver)
    }

    /// The executor that tasks chained onto this future run on.
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    /// Whether the future has resolved. Never blocks.
    pub fn is_resolved(&self) -> bool {
        self.inner.signal.is_fired()
    }

    fn outcome(&self) -> Option<&Result<T>> {
        if self.is_resolved() {
            self.inner.outcome.get()
        } else {
            None
        }
    }

    /// Run `f` once this future has resolved, on the resolving thread.
    pub(crate) fn on_resolve(&self, f: impl FnOnce() + Send + 'static) {
        self.inner.signal.on_fire(f)
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    /// Once this future resolves, run `body` on its outcome in a new task and
    /// resolve the returned future with the result.
    pub(crate) fn derive<U, F>(&self, body: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&Result<T>) -> Result<U> + Send + 'static,
    {
        let (derived, resolver) = Future::pending(self.executor().clone());
        let parent = self.clone();

        self.on_resolve(move || {
            let executor = parent.executor().clone();

            executor.execute(move || {
                let outcome = trap_result(|| match parent.outcome() {
                    Some(outcome) => body(outcome),
                    None => Err(Error::Abandoned),
                });

                resolver.resolve(outcome);
            });
        });

        derived
    }
}

impl<T: Clone> Future<T> {
    fn settled(&self) -> Result<T> {
        match self.outcome() {
            Some(outcome) => outcome.clone(),
            None => Err(Error::Abandoned),
        }
    }

    /// Block until the future resolves and return its outcome.
    pub fn try_join(&self) -> Result<T> {
        self.inner.signal.wait();
        self.settled()
    }

    /// Block until the future resolves and return its value.
    ///
    /// # Panics
    ///
    /// If the future failed, panics with its [Error] as the payload. Inside
    /// the callback of another future this simply fails that future with the
    /// same error.
    pub fn join(&self) -> T {
        self.try_join().unwrap_or_else(|err| err.raise())
    }

    /// Like [Future::try_join], but gives up after `timeout`, returning `None`
    /// if the future is still pending. The future itself is not affected.
    pub fn join_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        if self.inner.signal.wait_timeout(timeout) {
            Some(self.settled())
        } else {
            None
        }
    }

    /// The outcome, if the future has already resolved. Never blocks.
    pub fn peek(&self) -> Option<Result<T>> {
        self.outcome().cloned()
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("outcome", &self.outcome())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
