//! ### Ordered slots
//!
//! [Slots] is the shared container behind the aggregating combinators. It is
//! created with a fixed number of positions, one per input future, and is
//! filled in whatever order the inputs finish. Values land at the index of
//! the input they came from; failures are appended to an error list that
//! records the same index. Both live behind one lock, taken through
//! [Slots::lock], so a position and the error list are never updated
//! concurrently.
//!
//! #### Example
//!
//! ```rust
//! use futura::sync::slots::Slots;
//! use futura::error::Error;
//!
//! let slots = Slots::with_len(3);
//!
//! {
//!     let mut guard = slots.lock();
//!     guard.set(2, "c");
//!     guard.fail(1, Error::Canceled);
//!     guard.set(0, "a");
//!     assert_eq!(guard.remaining(), 0);
//! }
//!
//! let err = slots.lock().take().unwrap_err();
//! assert_eq!(err.to_string(), "operation was canceled");
//! ```
use std::{
    mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::error::{AggregateError, Error, Result};

/// A fixed-size, index addressed container with a shared error list.
///
/// See the [module-level documentation](self) for more information.
pub struct Slots<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    values: Vec<Option<T>>,
    errors: Vec<(usize, Error)>,
    remaining: usize,
}

/// Exclusive access to a [Slots] container.
///
/// The lock is released when the guard is dropped.
pub struct SlotsGuard<'a, T> {
    inner: MutexGuard<'a, Inner<T>>,
}

impl<T> Slots<T> {
    /// Create a container with `len` empty positions.
    pub fn with_len(len: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                values: (0..len).map(|_| None).collect(),
                errors: Vec::new(),
                remaining: len,
            }),
        }
    }

    /// Acquire exclusive access to the container, blocking if necessary.
    pub fn lock(&self) -> SlotsGuard<'_, T> {
        SlotsGuard {
            inner: self.inner.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl<T> SlotsGuard<'_, T> {
    fn settle(&mut self, index: usize) {
        self.inner.remaining = self.inner.remaining.saturating_sub(1);

        log::trace!(
            "slot {index} settled, {} remaining",
            self.inner.remaining
        );
    }

    /// Store `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        self.inner.values[index] = Some(value);
        self.settle(index);
    }

    /// Record that the input at `index` failed with `err`.
    pub fn fail(&mut self, index: usize, err: Error) {
        self.inner.errors.push((index, err));
        self.settle(index);
    }

    /// Number of positions that have neither a value nor an error yet.
    pub fn remaining(&self) -> usize {
        self.inner.remaining
    }

    /// Move the contents out, leaving the container empty.
    ///
    /// Yields the values in index order if every position was filled, or an
    /// [AggregateError] with every recorded failure otherwise.
    pub fn take(&mut self) -> Result<Vec<T>> {
        let errors = mem::take(&mut self.inner.errors);
        let values = mem::take(&mut self.inner.values);

        if !errors.is_empty() {
            return Err(AggregateError::new(errors).into());
        }

        values
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or(Error::Abandoned)
    }
}
