//! `eventfd` backed notifications.
//!
//! An [Event] is a file descriptor that becomes readable once it has been
//! notified and stays readable afterwards. Its only purpose is to be waited on
//! together with a [Timer](super::timer::Timer) through
//! [race](super::timer::race), which is how a deadline is raced against the
//! completion of a task.
use std::{
    io::Result,
    os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd},
};

use libc::{EFD_CLOEXEC, EFD_NONBLOCK};

pub struct Event {
    fd: OwnedFd,
}

impl Event {
    pub fn new() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, EFD_CLOEXEC | EFD_NONBLOCK) };

        if fd == -1 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Make the event readable. Notifying more than once is harmless.
    pub fn notify(&self) -> Result<()> {
        let one: u64 = 1;

        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &one as *const u64 as *const _,
                std::mem::size_of::<u64>(),
            )
        };

        if ret == -1 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(())
    }
}

impl AsFd for Event {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
