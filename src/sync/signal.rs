//! One-shot completion signal.
//!
//! A [Signal] starts out pending and is fired exactly once. Anything waiting on
//! it is released when it fires, and anything that starts waiting afterwards
//! returns immediately. Three kinds of waiters are supported:
//!
//! - threads blocking in [Signal::wait] or [Signal::wait_timeout], which are
//!   parked and unparked;
//! - async tasks, whose [Waker] is registered while they poll;
//! - callbacks registered with [Signal::on_fire], run once on the thread that
//!   fires the signal (or immediately, if it already fired).
//!
//! Waiters are kept in a [Slab] so that a timed-out thread or a dropped async
//! waiter can remove exactly its own entry.
//!
//! # Example
//!
//! ```
//! use futura::sync::signal::Signal;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let signal = Arc::new(Signal::new());
//! let s2 = signal.clone();
//!
//! let t = thread::spawn(move || s2.wait());
//! assert!(signal.fire());
//! assert!(!signal.fire());
//! t.join().unwrap();
//! ```
use std::{
    fmt,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    task::Waker,
    thread::{self, Thread},
    time::{Duration, Instant},
};

use log::error;
use slab::Slab;

enum Waiter {
    Thread(Thread),
    Task(Waker),
    Callback(Box<dyn FnOnce() + Send>),
}

impl Waiter {
    fn wake(self) {
        match self {
            Waiter::Thread(thread) => thread.unpark(),
            Waiter::Task(waker) => waker.wake(),
            Waiter::Callback(f) => f(),
        }
    }
}

/// A one-shot event.
///
/// See the [module-level documentation](self) for more information.
pub struct Signal {
    fired: AtomicBool,
    waiters: Mutex<Slab<Waiter>>,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            waiters: Mutex::new(Slab::new()),
        }
    }

    /// Whether the signal has fired. Once this returns `true`, every write made
    /// before [Signal::fire] by the firing thread is visible to the caller.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn waiters(&self) -> MutexGuard<'_, Slab<Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the signal, releasing all waiters.
    ///
    /// Returns `false` if the signal had already fired, in which case nothing
    /// happens.
    pub fn fire(&self) -> bool {
        let waiters = {
            let mut waiters = self.waiters();

            if self.fired.load(Ordering::Relaxed) {
                return false;
            }

            self.fired.store(true, Ordering::Release);

            mem::take(&mut *waiters)
        };

        // Wake outside the lock; callbacks may register on other signals, or
        // on this one. A panicking callback must not strand the waiters
        // behind it.
        for (_, waiter) in waiters {
            if panic::catch_unwind(AssertUnwindSafe(|| waiter.wake())).is_err() {
                error!("completion callback panicked");
            }
        }

        true
    }

    /// Block the calling thread until the signal fires.
    pub fn wait(&self) {
        if self.is_fired() {
            return;
        }

        {
            let mut waiters = self.waiters();

            if self.is_fired() {
                return;
            }

            waiters.insert(Waiter::Thread(thread::current()));
        }

        // Unparks may be spurious, the flag is the source of truth.
        while !self.is_fired() {
            thread::park();
        }
    }

    /// Block the calling thread until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_fired() {
            return true;
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let key = {
            let mut waiters = self.waiters();

            if self.is_fired() {
                return true;
            }

            waiters.insert(Waiter::Thread(thread::current()))
        };

        loop {
            if self.is_fired() {
                return true;
            }

            let now = Instant::now();

            if now >= deadline {
                break;
            }

            thread::park_timeout(deadline - now);
        }

        let mut waiters = self.waiters();

        if self.is_fired() {
            return true;
        }

        // Not fired, so the slab has not been drained and the key is still ours.
        waiters.remove(key);

        false
    }

    /// Run `f` once the signal fires.
    ///
    /// If the signal has already fired, `f` runs immediately on the calling
    /// thread. Otherwise it runs on the thread that calls [Signal::fire]; keep
    /// it short.
    pub fn on_fire(&self, f: impl FnOnce() + Send + 'static) {
        {
            let mut waiters = self.waiters();

            if !self.is_fired() {
                waiters.insert(Waiter::Callback(Box::new(f)));
                return;
            }
        }

        f()
    }

    /// Register (or refresh) the waker of an async waiter.
    ///
    /// `key` is the value returned by the previous call for the same waiter.
    /// Returns `None` if the signal has already fired, otherwise the key to
    /// pass next time.
    pub(crate) fn register_waker(&self, key: Option<usize>, waker: &Waker) -> Option<usize> {
        let mut waiters = self.waiters();

        if self.is_fired() {
            return None;
        }

        if let Some(Waiter::Task(existing)) = key.and_then(|key| waiters.get_mut(key)) {
            existing.clone_from(waker);
            return key;
        }

        Some(waiters.insert(Waiter::Task(waker.clone())))
    }

    /// Drop the entry of an async waiter that is no longer interested.
    pub(crate) fn deregister(&self, key: usize) {
        let mut waiters = self.waiters();

        if !self.is_fired() && waiters.contains(key) {
            waiters.remove(key);
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("fired", &self.is_fired())
            .finish()
    }
}
