//! Synchronisation primitives.
//!
//! The `sync` module holds the building blocks that futures are made of. None
//! of them know about futures; they are small, self-contained primitives that
//! the [future](crate::future) module composes.
//!
//! The following sub-modules are exposed by the `sync` module:
//!
//! - `cancel`: A cooperative cancellation flag.
//! - `event`: `eventfd` notifications, raced against timers.
//! - `signal`: The one-shot completion signal every future resolves through.
//! - `slots`: An ordered, lockable container used to gather many results.
//! - `timer`: One-shot timers using `timerfd`.
pub mod cancel;
pub mod event;
pub mod signal;
pub mod slots;
pub mod timer;
