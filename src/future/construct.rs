//! Constructors: starting background work.
use std::{io, sync::Arc, time::Duration};

use log::{debug, trace, warn};

use super::Future;
use crate::{
    error::{Error, Result},
    sync::{
        cancel::CancelToken,
        event::Event,
        timer::{race, Timer, Wakeup},
    },
    task::Executor,
    trap::{trap, trap_result},
};

/// Block until `work` resolves or `d` elapses. `Ok(true)` means `work` won.
fn race_deadline<T>(work: &Future<T>, d: Duration) -> io::Result<bool> {
    let timer = Timer::sleep(d)?;
    let event = Arc::new(Event::new()?);

    {
        let event = event.clone();
        work.on_resolve(move || {
            if let Err(e) = event.notify() {
                warn!("could not signal completion to deadline thread: {e}");
            }
        });
    }

    Ok(race(&timer, &event)? == Wakeup::Notified)
}

impl Executor {
    /// Start a task whose outcome is `body`'s, with panics trapped.
    pub(crate) fn launch<T, F>(&self, body: F) -> Future<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (future, resolver) = Future::pending(self.clone());

        trace!("launching task");

        self.execute(move || resolver.resolve(trap_result(body)));

        future
    }

    /// Run `callback` in the background; its return value resolves the future.
    ///
    /// If `callback` panics, the future fails with the panic's error.
    pub fn spawn<T, F>(&self, callback: F) -> Future<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.launch(move || Ok(callback()))
    }

    /// Run a fallible `callback` in the background. An `Err` fails the future
    /// just like a panic would.
    pub fn try_spawn<T, E, F>(&self, callback: F) -> Future<T>
    where
        T: Send + Sync + 'static,
        E: Into<Error>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        self.launch(move || callback().map_err(Into::into))
    }

    /// Run `callback`, which produces nothing, in the background.
    pub fn void<F>(&self, callback: F) -> Future<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(move || {
            callback();
        })
    }

    /// A future for a value that is already known.
    ///
    /// It still resolves through a background task, like every other future.
    pub fn value<T>(&self, value: T) -> Future<T>
    where
        T: Send + Sync + 'static,
    {
        self.spawn(move || value)
    }

    /// Run `callback` in the background, failing with
    /// [Timeout](crate::error::ErrorKind::Timeout) if it has not finished
    /// after `timeout`.
    ///
    /// The callback is not interrupted when the deadline elapses; it runs to
    /// completion and its result is discarded. Use [Executor::timeout_with] for
    /// work that can stop early.
    pub fn timeout<T, F>(&self, callback: F, timeout: Duration) -> Future<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.timeout_with(move |_| Ok(callback()), timeout)
    }

    /// Like [Executor::timeout], but `callback` is handed a [CancelToken] that
    /// is cancelled when the deadline elapses.
    pub fn timeout_with<T, F>(&self, callback: F, timeout: Duration) -> Future<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
    {
        let token = CancelToken::new();

        let work = {
            let token = token.clone();
            self.launch(move || callback(&token))
        };

        let (future, resolver) = Future::pending(self.clone());

        self.execute_dedicated("deadline", move || {
            let outcome = match race_deadline(&work, timeout) {
                Ok(true) => work.settled(),
                Ok(false) => {
                    debug!("deadline of {timeout:?} elapsed, cancelling task");
                    token.cancel();
                    Err(Error::Timeout(timeout))
                }
                Err(e) => {
                    token.cancel();
                    Err(e.into())
                }
            };

            resolver.resolve(outcome);
        });

        future
    }

    /// Run `callback` in the background once `delay` has elapsed.
    pub fn delay<T, F>(&self, callback: F, delay: Duration) -> Future<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (future, resolver) = Future::pending(self.clone());
        let executor = self.clone();

        self.execute_dedicated("delay", move || {
            if let Err(e) = Timer::sleep(delay).and_then(|timer| timer.wait()) {
                resolver.resolve(Err(e.into()));
                return;
            }

            trace!("delay of {delay:?} elapsed");

            executor.execute(move || resolver.resolve(trap(callback)));
        });

        future
    }
}

/// Constructors running on the [global](Executor::global) executor.
impl<T: Send + Sync + 'static> Future<T> {
    /// See [Executor::spawn].
    pub fn spawn<F>(callback: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Executor::global().spawn(callback)
    }

    /// See [Executor::try_spawn].
    ///
    /// ```
    /// use futura::{error::{Error, ErrorKind}, future::Future};
    ///
    /// let f = Future::try_spawn(|| "12x".parse::<u32>().map_err(|e| Error::custom("parse", e)));
    /// assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Custom("parse"));
    /// ```
    pub fn try_spawn<E, F>(callback: F) -> Self
    where
        E: Into<Error>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        Executor::global().try_spawn(callback)
    }

    /// See [Executor::value].
    pub fn value(value: T) -> Self {
        Executor::global().value(value)
    }

    /// See [Executor::delay].
    pub fn delay<F>(callback: F, delay: Duration) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Executor::global().delay(callback, delay)
    }
}

impl<T: Clone + Send + Sync + 'static> Future<T> {
    /// See [Executor::timeout].
    ///
    /// ```
    /// use futura::{error::ErrorKind, future::Future};
    /// use std::{thread, time::Duration};
    ///
    /// let slow = Future::timeout(
    ///     || {
    ///         thread::sleep(Duration::from_millis(500));
    ///         1
    ///     },
    ///     Duration::from_millis(50),
    /// );
    /// assert_eq!(slow.try_join().unwrap_err().kind(), ErrorKind::Timeout);
    ///
    /// let fast = Future::timeout(|| 2, Duration::from_secs(5));
    /// assert_eq!(fast.join(), 2);
    /// ```
    pub fn timeout<F>(callback: F, timeout: Duration) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Executor::global().timeout(callback, timeout)
    }

    /// See [Executor::timeout_with].
    pub fn timeout_with<F>(callback: F, timeout: Duration) -> Self
    where
        F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
    {
        Executor::global().timeout_with(callback, timeout)
    }
}

impl Future<()> {
    /// See [Executor::void].
    pub fn void<F>(callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Executor::global().void(callback)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            mpsc::channel,
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    use crate::{
        error::{Error, ErrorKind},
        future::{init_logging, Future},
        task::{Config, Executor},
    };

    #[test]
    fn spawn_does_not_block() {
        let before = Instant::now();
        let f = Future::spawn(|| {
            thread::sleep(Duration::from_millis(500));
            1
        });

        assert!(before.elapsed() < Duration::from_millis(500));
        assert_eq!(f.join(), 1);
    }

    #[test]
    fn void_does_not_block() {
        let (tx, rx) = channel();
        let before = Instant::now();

        let f = Future::void(move || {
            thread::sleep(Duration::from_millis(300));
            tx.send(()).unwrap();
        });

        assert!(before.elapsed() < Duration::from_millis(300));
        f.join();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn value() {
        assert_eq!(Future::value(1).join(), 1);
        assert_eq!(Future::value("x").try_join().unwrap(), "x");
    }

    #[test]
    fn spawn_failure() {
        let f = Future::<u8>::spawn(|| panic!("exception on async"));
        let err = f.try_join().unwrap_err();

        assert!(matches!(err, Error::Panicked(ref m) if m == "exception on async"));
    }

    #[test]
    fn try_spawn_failure() {
        let f = Future::<u8>::try_spawn(|| Err(Error::custom("io", "disk full")));
        let err = f.try_join().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Custom("io"));
        assert_eq!(err.to_string(), "io: disk full");
    }

    #[test]
    fn timeout_elapses() {
        init_logging();

        let finished = Arc::new(AtomicBool::new(false));
        let before = Instant::now();

        let f = {
            let finished = finished.clone();
            Future::timeout(
                move || {
                    thread::sleep(Duration::from_millis(400));
                    finished.store(true, Ordering::SeqCst);
                    1
                },
                Duration::from_millis(100),
            )
        };

        let err = f.try_join().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(100)));
        assert!(before.elapsed() < Duration::from_millis(400));
        assert!(!finished.load(Ordering::SeqCst));

        // The callback is not interrupted and still finishes in the background.
        thread::sleep(Duration::from_millis(500));
        assert!(finished.load(Ordering::SeqCst));

        // The outcome does not change afterwards.
        assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Timeout);
    }

    #[test]
    fn timeout_not_reached() {
        let f = Future::timeout(
            || {
                thread::sleep(Duration::from_millis(100));
                1
            },
            Duration::from_secs(1),
        );

        assert_eq!(f.join(), 1);
    }

    #[test]
    fn timeout_propagates_callback_failure() {
        let f = Future::<u8>::timeout(|| panic!("early"), Duration::from_secs(1));
        assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Panicked);
    }

    #[test]
    fn timeout_with_cancels_token() {
        let iterations = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));

        let f = {
            let iterations = iterations.clone();
            let stopped = stopped.clone();
            Future::<()>::timeout_with(
                move |token| {
                    while !token.is_canceled() {
                        iterations.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                    }
                    stopped.store(true, Ordering::SeqCst);
                    Err(Error::Canceled)
                },
                Duration::from_millis(100),
            )
        };

        assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Timeout);

        thread::sleep(Duration::from_millis(100));
        assert!(stopped.load(Ordering::SeqCst));
        assert!(iterations.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn delay() {
        let before = Instant::now();
        let f = Future::delay(move || before.elapsed(), Duration::from_millis(200));

        assert!(before.elapsed() < Duration::from_millis(200));

        let observed = f.join();
        assert!(observed >= Duration::from_millis(200));
        assert!(before.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn timeout_without_deadline() {
        let f = Future::timeout(|| 7u32, Duration::MAX);
        assert_eq!(f.try_join().unwrap(), 7);

        let f = Future::<u8>::timeout(|| panic!("still reported"), Duration::MAX);
        assert_eq!(f.try_join().unwrap_err().kind(), ErrorKind::Panicked);
    }

    #[test]
    fn delay_without_deadline_stays_pending() {
        let f = Future::delay(|| 1u8, Duration::MAX);

        thread::sleep(Duration::from_millis(200));
        assert!(f.peek().is_none());
        assert!(!f.is_resolved());
    }

    #[test]
    fn constructors_on_a_pool() -> anyhow::Result<()> {
        let pool = Executor::new(Config::default().with_workers(1))?;

        let a = pool.value(1);
        let b = pool.spawn(|| 2);
        let c = pool.delay(|| 3, Duration::from_millis(10));
        let d = pool.timeout(|| 4, Duration::from_secs(1));

        assert_eq!(a.join() + b.join() + c.join() + d.join(), 10);

        pool.shutdown();

        let late = pool.spawn(|| 5);
        assert_eq!(late.try_join().unwrap_err().kind(), ErrorKind::Abandoned);

        Ok(())
    }
}
