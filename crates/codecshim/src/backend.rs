// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Contract between the virtual device and a codec implementation
//!
//! The device owns the V4L2 protocol surface; a [`CodecBackend`] owns the
//! actual decode/encode work. Every method here must return promptly --
//! "busy" is a normal outcome reported through a `false` return, never an
//! error, and never a blocking wait. The device serializes all calls into
//! the backend behind a single device-wide lock that is held only for the
//! duration of the call.
//!
//! A pulse is one attempt to move exactly one buffer through the codec.
//! Input pulses consume the buffer staged by
//! [`CodecBackend::accept_input_buffer`]; output pulses surface a completed
//! result and may substitute a different buffer index, because completion
//! order is the codec's decision, not the submission order.

use crate::buffer::BufferDesc;

/// Operations the virtual device requires from a codec implementation.
///
/// Implementations move between worker threads, hence the `Send` bound.
/// They do not need to be `Sync`; the device guarantees mutual exclusion.
pub trait CodecBackend: Send {
    /// Bring the codec up. Called once from STREAMON on the input queue.
    fn start(&mut self) -> bool;

    /// Tear the codec down. Called from device close.
    fn stop(&mut self) -> bool;

    /// Discard any staged input. Called when the input worker exits.
    fn flush(&mut self);

    /// Validate and stage a buffer the client queued to the input port.
    ///
    /// `data` holds the buffer's plane bytes when the queue uses MMAP
    /// memory, and is empty otherwise (the payload then travels through the
    /// descriptor's out-of-band handle).
    fn accept_input_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> bool;

    /// Consume staged input buffer `index`. `false` means "not ready, try
    /// again later".
    fn input_pulse(&mut self, index: u32) -> bool;

    /// Surface a completed result. On success the implementation may
    /// overwrite `index` with the buffer it actually filled.
    fn output_pulse(&mut self, index: &mut u32) -> bool;

    /// Fill in the descriptor (and the MMAP plane bytes) for a completed
    /// output buffer the client is dequeuing.
    fn give_output_buffer(&mut self, desc: &mut BufferDesc, data: &mut [u8]) -> bool;

    /// The client is dequeuing a consumed input buffer.
    fn recycle_input_buffer(&mut self, _desc: &mut BufferDesc) -> bool {
        true
    }

    /// A previously given output buffer is back under codec ownership (the
    /// client re-queued it).
    fn recycle_output_buffer(&mut self, _index: u32) -> bool {
        true
    }

    /// Unblocking hook for teardown and queue reallocation.
    ///
    /// `false` asks the backend to fail out of (and stop entering) any
    /// internal wait, e.g. "no free surface"; `true` restores normal
    /// blocking behavior.
    fn release_codec_lock(&mut self, _lockable: bool) {}

    /// Whether a codec-level event (resolution change) is pending.
    fn has_codec_event(&self) -> bool {
        false
    }

    /// Raise the codec-level event flag.
    fn set_codec_event(&mut self) {}

    /// Clear the codec-level event flag.
    fn clear_codec_event(&mut self) {}
}
