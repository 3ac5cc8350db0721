//! Awaiting futures from async code.
//!
//! A [Join] registers the polling task's waker with the future's completion
//! signal, so an async executor is woken rather than spinning.
use std::{
    future::IntoFuture,
    pin::Pin,
    task::{Context, Poll},
};

use super::Future;
use crate::error::Result;

/// Waits for a [Future] from an async context.
///
/// Obtained with [Future::joined] or by `.await`ing a future directly. The
/// output is the future's outcome as a [Result]; nothing is raised.
///
/// ```
/// use futura::future::Future;
///
/// let f = Future::spawn(|| 6 * 7);
/// let x = futures::executor::block_on(async { f.await });
/// assert_eq!(x.unwrap(), 42);
/// ```
pub struct Join<T> {
    future: Future<T>,
    key: Option<usize>,
}

impl<T> Future<T> {
    /// Wait for this future from an async context without consuming the
    /// handle.
    pub fn joined(&self) -> Join<T> {
        Join {
            future: self.clone(),
            key: None,
        }
    }
}

impl<T: Clone> std::future::Future for Join<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.future.is_resolved() {
            return Poll::Ready(self.future.settled());
        }

        let key = self.future.inner.signal.register_waker(self.key, cx.waker());

        match key {
            Some(key) => {
                self.key = Some(key);
                Poll::Pending
            }
            None => Poll::Ready(self.future.settled()),
        }
    }
}

impl<T> Drop for Join<T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.future.inner.signal.deregister(key);
        }
    }
}

impl<T: Clone> IntoFuture for Future<T> {
    type Output = Result<T>;
    type IntoFuture = Join<T>;

    fn into_future(self) -> Join<T> {
        self.joined()
    }
}
