//! Errors carried by failed futures.
//!
//! Every failed [Future](crate::future::Future) holds an [Error]. Errors are
//! grouped into categories described by [ErrorKind]; the
//! [catch](crate::future::Future::catch) combinator matches on these kinds
//! rather than on messages or on the concrete type of a value.
//!
//! User code can fail a future in three ways:
//!
//! 1. Return `Err` from a callback given to
//!    [try_spawn](crate::future::Future::try_spawn).
//! 2. Raise an [Error] with [Error::raise], which keeps its kind intact.
//! 3. Panic with any other payload, which is reported as
//!    [ErrorKind::Panicked].
//!
//! ```
//! use futura::{error::{Error, ErrorKind}, future::Future};
//!
//! let f = Future::<u32>::spawn(|| Error::custom("parse", "not a number").raise());
//! let err = f.try_join().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Custom("parse"));
//! assert_eq!(err.to_string(), "parse: not a number");
//! ```
use std::{any::Any, fmt, io, sync::Arc, time::Duration};

use thiserror::Error;

/// Shorthand for results whose error is the crate's [Error].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The category of an [Error].
///
/// Kinds are compared by plain equality; two errors of the same kind are
/// interchangeable as far as [catch](crate::future::Future::catch) is
/// concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A deadline elapsed before the work finished.
    Timeout,
    /// A callback panicked with a payload that was not an [Error].
    Panicked,
    /// Work observed a cancelled [CancelToken](crate::sync::cancel::CancelToken).
    Canceled,
    /// The task resolving a future was dropped without producing an outcome.
    Abandoned,
    /// An operating system resource could not be created or used.
    Io,
    /// One or more futures of an aggregate failed.
    Aggregate,
    /// A user-defined category.
    Custom(&'static str),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => f.write_str("timeout"),
            ErrorKind::Panicked => f.write_str("panicked"),
            ErrorKind::Canceled => f.write_str("canceled"),
            ErrorKind::Abandoned => f.write_str("abandoned"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Aggregate => f.write_str("aggregate"),
            ErrorKind::Custom(name) => f.write_str(name),
        }
    }
}

impl From<&Error> for ErrorKind {
    fn from(err: &Error) -> Self {
        err.kind()
    }
}

/// The error of a failed future.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The deadline given to [timeout](crate::future::Future::timeout) elapsed.
    #[error("deadline of {0:?} elapsed")]
    Timeout(Duration),

    /// A callback panicked.
    #[error("callback panicked: {0}")]
    Panicked(String),

    /// Work was cancelled through its token.
    #[error("operation was canceled")]
    Canceled,

    /// The resolving task went away without resolving the future, e.g. because
    /// it was submitted to an executor that had been shut down.
    #[error("future was abandoned before it resolved")]
    Abandoned,

    /// An operating system facility failed, such as a timer or event file
    /// descriptor or a worker thread.
    #[error("i/o failure: {0}")]
    Io(Arc<io::Error>),

    /// Failures collected by [wait](crate::future::Future::wait).
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// A user-defined failure.
    #[error("{kind}: {message}")]
    Custom {
        kind: &'static str,
        message: String,
    },
}

impl Error {
    /// Build a user-defined error whose kind is `ErrorKind::Custom(kind)`.
    pub fn custom(kind: &'static str, message: impl fmt::Display) -> Self {
        Error::Custom {
            kind,
            message: message.to_string(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Panicked(_) => ErrorKind::Panicked,
            Error::Canceled => ErrorKind::Canceled,
            Error::Abandoned => ErrorKind::Abandoned,
            Error::Io(_) => ErrorKind::Io,
            Error::Aggregate(_) => ErrorKind::Aggregate,
            Error::Custom { kind, .. } => ErrorKind::Custom(kind),
        }
    }

    /// Panic with this error as the payload.
    ///
    /// Inside a future's callback this fails the future with exactly this
    /// error. It is also what [join](crate::future::Future::join) does with the
    /// error of a failed future.
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }

    /// Recover an error from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Error>() {
            Ok(err) => return *err,
            Err(payload) => payload,
        };

        let payload = match payload.downcast::<&'static str>() {
            Ok(msg) => return Error::Panicked((*msg).to_owned()),
            Err(payload) => payload,
        };

        match payload.downcast::<String>() {
            Ok(msg) => Error::Panicked(*msg),
            Err(_) => Error::Panicked("<opaque panic payload>".to_owned()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

/// Every component failure of an aggregate, tagged with the position of the
/// failed future in the aggregate's input.
///
/// Components are kept in the order they were observed, which depends on
/// which futures finished first.
#[derive(Debug, Clone, Default)]
pub struct AggregateError {
    errors: Vec<(usize, Error)>,
}

impl AggregateError {
    pub fn new(errors: Vec<(usize, Error)>) -> Self {
        Self { errors }
    }

    /// `(index, error)` pairs in the order they were recorded.
    pub fn errors(&self) -> &[(usize, Error)] {
        &self.errors
    }

    /// The error of the input at `index`, if that input failed.
    pub fn get(&self, index: usize) -> Option<&Error> {
        self.errors
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, err)| err)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<(usize, Error)> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, (_, err)) in self.errors.iter().enumerate() {
            if n > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }

        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use std::{panic, time::Duration};

    use super::{AggregateError, Error, ErrorKind};

    #[test]
    fn kinds() {
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::custom("db", "gone").kind(), ErrorKind::Custom("db"));
        assert_ne!(
            Error::custom("db", "gone").kind(),
            Error::custom("net", "gone").kind()
        );
        assert_eq!(ErrorKind::from(&Error::Canceled), ErrorKind::Canceled);
    }

    #[test]
    fn raised_error_keeps_kind() {
        let payload = panic::catch_unwind(|| Error::custom("db", "gone").raise()).unwrap_err();
        let err = Error::from_panic(payload);

        assert_eq!(err.kind(), ErrorKind::Custom("db"));
        assert_eq!(err.to_string(), "db: gone");
    }

    #[test]
    fn plain_panics() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert!(matches!(Error::from_panic(payload), Error::Panicked(m) if m == "boom"));

        let payload = panic::catch_unwind(|| panic!("boom {}", 42)).unwrap_err();
        assert!(matches!(Error::from_panic(payload), Error::Panicked(m) if m == "boom 42"));

        let payload = panic::catch_unwind(|| panic::panic_any(7u8)).unwrap_err();
        assert_eq!(Error::from_panic(payload).kind(), ErrorKind::Panicked);
    }

    #[test]
    fn aggregate_display_joins_lines() {
        let agg = AggregateError::new(vec![
            (2, Error::custom("a", "first")),
            (0, Error::Canceled),
        ]);

        assert_eq!(agg.to_string(), "a: first\noperation was canceled");
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get(0).map(Error::kind), Some(ErrorKind::Canceled));
        assert!(agg.get(1).is_none());
        assert_eq!(Error::from(agg).kind(), ErrorKind::Aggregate);
    }
}
