//! Blocking timers.
//!
//! This module uses the Linux kernel's
//! [timerfd](https://man7.org/linux/man-pages/man2/timerfd_create.2.html)
//! facility to implement one-shot timers. A [Timer] can simply be slept on, or
//! raced against an [Event] with [race], whichever becomes ready first.
//!
//! # Example
//!
//! ```
//! use futura::sync::timer::Timer;
//! use std::time::{Duration, Instant};
//!
//! let now = Instant::now();
//! Timer::sleep(Duration::from_millis(100)).unwrap().wait().unwrap();
//! assert!(now.elapsed() >= Duration::from_millis(100));
//! ```
use std::{
    io::{Error, ErrorKind, Result},
    os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd},
    ptr::null_mut,
    time::{Duration, Instant},
};

use libc::{CLOCK_MONOTONIC, POLLIN, TFD_CLOEXEC, TFD_NONBLOCK};

use super::event::Event;

/// A one-shot timer.
///
/// The timer is armed on creation and expires once the requested duration has
/// elapsed. It is guaranteed to expire no earlier than that; it could expire
/// later. A duration that reaches past the end of the monotonic clock, such as
/// [Duration::MAX], yields a timer that never expires.
pub struct Timer {
    expiration: Option<Instant>,
    fd: OwnedFd,
}

/// What woke up a [race].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    Expired,
    Notified,
}

impl Timer {
    fn compute_tspec(d: Duration) -> libc::itimerspec {
        let mut tspec = unsafe { std::mem::zeroed::<libc::itimerspec>() };

        // An all zero `it_value` disarms the timer instead of firing it.
        let d = d.max(Duration::from_nanos(1));

        tspec.it_value.tv_sec = d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t;
        tspec.it_value.tv_nsec = d.subsec_nanos() as _;

        tspec
    }

    /// Create a timer that expires after `d`.
    pub fn sleep(d: Duration) -> Result<Self> {
        let expiration = Instant::now().checked_add(d);
        let timer = unsafe { libc::timerfd_create(CLOCK_MONOTONIC, TFD_NONBLOCK | TFD_CLOEXEC) };

        if timer == -1 {
            return Err(Error::last_os_error());
        }

        let fd = unsafe { OwnedFd::from_raw_fd(timer) };

        // Left disarmed when the deadline cannot be represented, so the fd
        // never becomes readable.
        if expiration.is_some() {
            let tspec = Self::compute_tspec(d);

            let ret = unsafe {
                libc::timerfd_settime(fd.as_raw_fd(), 0, &tspec as *const _, null_mut())
            };

            if ret == -1 {
                return Err(Error::last_os_error());
            }
        }

        Ok(Self { expiration, fd })
    }

    pub fn is_expired(&self) -> bool {
        self.expiration
            .is_some_and(|expiration| Instant::now() >= expiration)
    }

    /// Block the calling thread until the timer expires.
    pub fn wait(&self) -> Result<()> {
        while !self.is_expired() {
            let mut pfd = [pollfd(self.as_fd())];
            poll(&mut pfd)?;
        }

        Ok(())
    }
}

impl AsFd for Timer {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

fn pollfd(fd: BorrowedFd<'_>) -> libc::pollfd {
    libc::pollfd {
        fd: fd.as_raw_fd(),
        events: POLLIN,
        revents: 0,
    }
}

fn poll(fds: &mut [libc::pollfd]) -> Result<()> {
    loop {
        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as _, -1) };

        if ret != -1 {
            return Ok(());
        }

        let err = Error::last_os_error();

        if err.kind() != ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Block until either `timer` expires or `event` is notified.
///
/// If both are ready when the thread wakes up, the notification wins.
pub fn race(timer: &Timer, event: &Event) -> Result<Wakeup> {
    loop {
        let mut pfds = [pollfd(timer.as_fd()), pollfd(event.as_fd())];

        poll(&mut pfds)?;

        if pfds[1].revents & POLLIN != 0 {
            return Ok(Wakeup::Notified);
        }

        if timer.is_expired() {
            return Ok(Wakeup::Expired);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use super::{race, Timer, Wakeup};
    use crate::sync::event::Event;

    #[test]
    fn sleep_simple() -> anyhow::Result<()> {
        let before = Instant::now();
        Timer::sleep(Duration::from_millis(200))?.wait()?;
        assert!(before.elapsed() >= Duration::from_millis(200));
        assert!(before.elapsed() < Duration::from_millis(1000));

        Ok(())
    }

    #[test]
    fn sleep_zero() -> anyhow::Result<()> {
        let before = Instant::now();
        Timer::sleep(Duration::ZERO)?.wait()?;
        assert!(before.elapsed() < Duration::from_millis(500));

        Ok(())
    }

    #[test]
    fn race_expires() -> anyhow::Result<()> {
        let before = Instant::now();
        let timer = Timer::sleep(Duration::from_millis(100))?;
        let evt = Event::new()?;

        assert_eq!(race(&timer, &evt)?, Wakeup::Expired);
        assert!(before.elapsed() >= Duration::from_millis(100));

        Ok(())
    }

    #[test]
    fn sleep_forever() -> anyhow::Result<()> {
        let timer = Timer::sleep(Duration::MAX)?;
        let evt = Event::new()?;

        assert!(!timer.is_expired());

        evt.notify()?;
        assert_eq!(race(&timer, &evt)?, Wakeup::Notified);
        assert!(!timer.is_expired());

        Ok(())
    }

    #[test]
    fn race_notified() -> anyhow::Result<()> {
        let before = Instant::now();
        let timer = Timer::sleep(Duration::from_secs(10))?;
        let evt = Arc::new(Event::new()?);

        let t = {
            let evt = evt.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                evt.notify().unwrap();
            })
        };

        assert_eq!(race(&timer, &evt)?, Wakeup::Notified);
        assert!(before.elapsed() < Duration::from_secs(10));

        t.join().unwrap();

        Ok(())
    }
}
