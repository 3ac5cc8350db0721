//! Combinators: deriving one future from another.
//!
//! Every combinator returns a new future and leaves the parent untouched. The
//! handler runs in a new task once the parent resolves; if it panics, the
//! derived future fails with that panic's error.
use super::Future;
use crate::error::{Error, ErrorKind};

impl<T: Clone + Send + Sync + 'static> Future<T> {
    /// Apply `on_value` to the value of this future.
    ///
    /// If this future fails, the derived future fails with the same error and
    /// `on_value` never runs.
    ///
    /// ```
    /// use futura::future::Future;
    ///
    /// let f = Future::spawn(|| 20).then(|x| x + 1).then(|x| x * 2);
    /// assert_eq!(f.join(), 42);
    /// ```
    pub fn then<U, F>(&self, on_value: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.derive(move |outcome| match outcome {
            Ok(value) => Ok(on_value(value.clone())),
            Err(err) => Err(err.clone()),
        })
    }

    /// Apply `on_value` on success, or absorb the error with `on_error`.
    ///
    /// Whichever handler runs provides the value of the derived future.
    pub fn then_else<U, F, G>(&self, on_value: F, on_error: G) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
        G: FnOnce(Error) -> U + Send + 'static,
    {
        self.derive(move |outcome| match outcome {
            Ok(value) => Ok(on_value(value.clone())),
            Err(err) => Ok(on_error(err.clone())),
        })
    }

    /// Replace a failure with the value `on_error` computes from it. A
    /// successful value passes through unchanged.
    ///
    /// ```
    /// use futura::future::Future;
    ///
    /// let f = Future::spawn(|| -> u32 { panic!("offline") }).recover(|_| 0);
    /// assert_eq!(f.join(), 0);
    /// ```
    pub fn recover<G>(&self, on_error: G) -> Future<T>
    where
        G: FnOnce(Error) -> T + Send + 'static,
    {
        self.derive(move |outcome| match outcome {
            Ok(value) => Ok(value.clone()),
            Err(err) => Ok(on_error(err.clone())),
        })
    }

    /// Run `handler` once this future resolves, whatever the outcome.
    ///
    /// The derived future resolves with this future's outcome, unless
    /// `handler` panics, in which case it fails with that panic's error.
    ///
    /// ```
    /// use futura::future::Future;
    /// use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
    ///
    /// let done = Arc::new(AtomicBool::new(false));
    /// let flag = done.clone();
    ///
    /// let f = Future::spawn(|| 100).complete(move || flag.store(true, Ordering::SeqCst));
    /// assert_eq!(f.join(), 100);
    /// assert!(done.load(Ordering::SeqCst));
    /// ```
    pub fn complete<F>(&self, handler: F) -> Future<T>
    where
        F: FnOnce() + Send + 'static,
    {
        self.derive(move |outcome| {
            let outcome = outcome.clone();
            handler();
            outcome
        })
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Future<T> {
    /// Handle errors of one [ErrorKind].
    ///
    /// If this future fails with an error of kind `kind`, `handler` sees the
    /// error and the derived future resolves with `T::default()`. Errors of any
    /// other kind propagate unchanged, and a successful value passes through.
    ///
    /// `kind` may also be given as a sentinel `&Error`, in which case its kind
    /// is used.
    ///
    /// ```
    /// use futura::{error::{Error, ErrorKind}, future::Future};
    ///
    /// let f = Future::<u32>::spawn(|| Error::custom("db", "gone").raise())
    ///     .catch(ErrorKind::Timeout, |_| unreachable!())
    ///     .catch(ErrorKind::Custom("db"), |err| eprintln!("handled: {err}"));
    ///
    /// assert_eq!(f.join(), 0);
    /// ```
    pub fn catch<K, F>(&self, kind: K, handler: F) -> Future<T>
    where
        K: Into<ErrorKind>,
        F: FnOnce(&Error) + Send + 'static,
    {
        let kind = kind.into();

        self.derive(move |outcome| match outcome {
            Ok(value) => Ok(value.clone()),
            Err(err) if err.kind() == kind => {
                handler(err);
                Ok(T::default())
            }
            Err(err) => Err(err.clone()),
        })
    }

    /// Handle any error.
    ///
    /// If this future fails, `handler` sees the error and the derived future
    /// resolves with `T::default()`. A successful value passes through.
    pub fn catch_all<F>(&self, handler: F) -> Future<T>
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.derive(move |outcome| match outcome {
            Ok(value) => Ok(value.clone()),
            Err(err) => {
                handler(err);
                Ok(T::default())
            }
        })
    }
}
