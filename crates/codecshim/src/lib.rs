// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Userspace V4L2 Stateful-Codec Device for Rust
//!
//! `codecshim` emulates the Linux V4L2 "mem2mem" stateful decode/encode
//! protocol entirely in userspace: buffer queues, REQBUFS/QBUF/DQBUF
//! ownership rules, STREAMON/STREAMOFF session lifecycle, and a pollable
//! readiness descriptor, driving an arbitrary codec backend through two
//! per-direction worker threads.
//!
//! The device reproduces kernel buffer-ownership semantics while the real
//! decode/encode work happens concurrently in the background: a buffer index
//! is never owned by two parties at once, buffer-queue reallocation
//! rendezvouses safely with in-flight work, and end-of-stream drains
//! deterministically across both directions.
//!
//! # Quick Start
//!
//! ```no_run
//! use codecshim::buffer::{BufType, BufferDesc, Format, FrameMemory, MemoryType, RequestBuffers};
//! use codecshim::device::{CodecDevice, Config};
//! use codecshim::fourcc::FourCC;
//! use codecshim::loopback::LoopbackCodec;
//!
//! let device = CodecDevice::open(LoopbackCodec::new(), Config::default())?;
//! device.set_frame_memory_type(FrameMemory::RawCopy)?;
//! device.set_format(BufType::OutputMplane, Format::single_plane(FourCC(*b"H264"), 1920, 1080, 1 << 20))?;
//! device.set_format(BufType::CaptureMplane, Format::single_plane(FourCC(*b"NV12"), 1920, 1080, 1920 * 1080 * 3 / 2))?;
//!
//! let mut req = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 4);
//! device.req_bufs(&mut req)?;
//!
//! // Fill a bitstream buffer and queue it.
//! device.map_buffer(BufType::OutputMplane, 0, 0)?[..4].copy_from_slice(&[0, 0, 0, 1]);
//! let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, 0, 1);
//! buf.planes[0].bytesused = 4;
//! device.stream_on(BufType::OutputMplane)?;
//! device.qbuf(&mut buf)?;
//!
//! // Wait for progress, then dequeue whatever completed.
//! let _event_pending = device.poll(true)?;
//! # Ok::<(), codecshim::Error>(())
//! ```
//!
//! # Threading Model
//!
//! One client-facing thread (the caller of the ioctl-style methods and
//! [`device::CodecDevice::poll`]) plus exactly two background worker threads,
//! one per port, created on the first STREAMON of a port and torn down by
//! STREAMOFF. No thread pool and no async runtime; coordination is a
//! mutex/condvar pair per port plus a device-wide codec lock serializing
//! backend calls.
//!
//! # Support
//!
//! For questions and support:
//! - Repository: <https://github.com/EdgeFirstAI/codecshim>
//! - Professional support: support@au-zone.com

use std::{error, fmt, io};

/// Error type for codec device operations
#[derive(Debug)]
pub enum Error {
    /// Transient condition: queue empty, port mid-transition, or backend
    /// busy. The caller should retry after the next poll wakeup. This is the
    /// userspace rendition of the kernel's `EAGAIN`.
    Again,

    /// Protocol misuse rejected synchronously with no state change (wrong
    /// buffer type, plane count, memory mode, or an out-of-range index)
    InvalidArgument(&'static str),

    /// Operation not legal in the current session state (e.g. QBUF on a
    /// released queue, reconfiguration while buffers are allocated)
    InvalidState(&'static str),

    /// A required configuration call has not been made yet (memory type or
    /// port format missing)
    NotConfigured(&'static str),

    /// The codec backend refused the buffer or the session transition
    Rejected(&'static str),

    /// I/O error from underlying system calls (eventfd, poll)
    Io(io::Error),
}

impl Error {
    /// Whether this error is the transient retry case.
    pub fn is_again(&self) -> bool {
        matches!(self, Error::Again)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Again => write!(f, "resource temporarily unavailable, try again"),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Error::InvalidState(what) => write!(f, "invalid state: {}", what),
            Error::NotConfigured(what) => write!(f, "not configured: {}", what),
            Error::Rejected(what) => write!(f, "rejected by codec backend: {}", what),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Error::Io(io::Error::from(err))
    }
}

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// The buffer module defines the typed ioctl payloads and format descriptors.
pub mod buffer;

/// The event module provides the pollable device/interrupt event channel.
pub mod event;

/// The backend module defines the contract a codec backend implements.
pub mod backend;

/// The device module provides the virtual stateful-codec device itself.
pub mod device;

/// The loopback module provides a software passthrough backend for testing
/// and bring-up.
pub mod loopback;

pub(crate) mod port;
pub(crate) mod worker;
