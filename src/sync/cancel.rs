//! Cooperative cancellation.
//!
//! A [CancelToken] is handed to the callback of
//! [timeout_with](crate::future::Future::timeout_with). When the deadline
//! elapses the token is cancelled; the callback is expected to notice and stop
//! early. Nothing interrupts a callback that never looks at its token.
//!
//! ```
//! use futura::{error::ErrorKind, future::Future};
//! use std::{thread, time::Duration};
//!
//! let f = Future::<()>::timeout_with(
//!     |token| loop {
//!         token.check()?;
//!         thread::sleep(Duration::from_millis(10));
//!     },
//!     Duration::from_millis(50),
//! );
//!
//! let err = f.try_join().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Timeout);
//! ```
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// `Err(Error::Canceled)` once the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}
