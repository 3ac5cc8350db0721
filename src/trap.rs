//! Panic trapping.
//!
//! Callbacks handed to futures report failure by panicking. [trap] runs such a
//! callback and turns a panic into an [Error], so the panic never escapes the
//! background task that ran it. The "finally" half of the contract, making sure
//! a future is resolved no matter how its task exits, is the job of the
//! future's resolver, which resolves on drop.
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Error, Result};

/// Run `f`, converting a panic into an error.
///
/// ```
/// use futura::{error::ErrorKind, trap::trap};
///
/// assert_eq!(trap(|| 2 + 2).unwrap(), 4);
///
/// let err = trap(|| -> u32 { panic!("no") }).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::Panicked);
/// ```
pub fn trap<T>(f: impl FnOnce() -> T) -> Result<T> {
    // The closure's captures are never observed again after a panic: callers
    // either drop them or only read the converted error.
    catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic)
}

/// Like [trap], for closures that already return a [Result].
pub fn trap_result<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    trap(f).and_then(|outcome| outcome)
}
