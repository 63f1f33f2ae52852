// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Pollable readiness signaling for the virtual device
//!
//! Two eventfd counters back the device's `poll()` emulation:
//!
//! - **device**: semaphore semantics, incremented once per completed buffer
//!   pulse and decremented once per poll return, so each wakeup accounts for
//!   one unit of progress.
//! - **interrupt**: set by the client to force an early return from a
//!   blocked poll, typically during shutdown.
//!
//! Both descriptors are exposed raw so a client event loop can fold them
//! into its own `poll(2)`/`epoll(7)` set instead of calling
//! [`EventChannel::wait`].

use std::os::fd::{AsFd, BorrowedFd};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};

use crate::Error;

/// The device/interrupt eventfd pair.
pub struct EventChannel {
    device: EventFd,
    interrupt: EventFd,
}

impl EventChannel {
    /// Create the eventfd pair.
    ///
    /// The device counter uses `EFD_SEMAPHORE` so one read consumes exactly
    /// one completion. Both are nonblocking: draining an empty counter is a
    /// no-op, not an error.
    pub fn new() -> Result<Self, Error> {
        let device = EventFd::from_flags(
            EfdFlags::EFD_SEMAPHORE | EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC,
        )?;
        let interrupt = EventFd::from_flags(EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC)?;
        Ok(EventChannel { device, interrupt })
    }

    /// Record one unit of codec progress.
    pub fn signal_device(&self) -> Result<(), Error> {
        self.device.write(1)?;
        Ok(())
    }

    /// Consume one unit of codec progress, if any.
    pub fn consume_device(&self) -> Result<(), Error> {
        match self.device.read() {
            Ok(_) => Ok(()),
            // Nothing pending and we read nonblocking. Not an error.
            Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Force the next (or a currently blocked) [`EventChannel::wait`] to
    /// return.
    pub fn signal_interrupt(&self) -> Result<(), Error> {
        self.interrupt.write(1)?;
        Ok(())
    }

    /// Drain the interrupt counter.
    pub fn clear_interrupt(&self) -> Result<(), Error> {
        match self.interrupt.read() {
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Descriptor signaling `POLLIN` while codec progress is pending.
    pub fn device_fd(&self) -> BorrowedFd {
        self.device.as_fd()
    }

    /// Descriptor signaling `POLLIN` once the interrupt is armed.
    pub fn interrupt_fd(&self) -> BorrowedFd {
        self.interrupt.as_fd()
    }

    /// Block until the interrupt fires or, if `poll_device`, codec progress
    /// is signaled.
    pub fn wait(&self, poll_device: bool) -> Result<(), Error> {
        loop {
            let interrupt_fd = self.interrupt.as_fd();
            let device_fd = self.device.as_fd();
            let mut fds = Vec::with_capacity(2);
            fds.push(PollFd::new(interrupt_fd, PollFlags::POLLIN | PollFlags::POLLERR));
            if poll_device {
                fds.push(PollFd::new(device_fd, PollFlags::POLLIN | PollFlags::POLLERR));
            }
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
