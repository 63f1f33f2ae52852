// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Software passthrough backend
//!
//! [`LoopbackCodec`] implements the [`CodecBackend`](crate::backend::CodecBackend)
//! contract without any real codec: each input payload becomes one output
//! frame, byte for byte, timestamps carried through. It exists for tests,
//! bring-up of client event loops, and the `codecshim` CLI's synthetic
//! sessions.
//!
//! Frames flow through three stages, mirroring a stateful decoder's
//! pipeline: *staged* (accepted at QBUF, not yet consumed), *ready*
//! (consumed by an input pulse, waiting for a free output slot), and
//! *filled* (bound to an output slot, waiting for the client's DQBUF).
//! Output slots become available as the client queues CAPTURE buffers,
//! so output completion order follows the recycle order, not the input
//! order.

use std::collections::{HashMap, VecDeque};

use crate::backend::CodecBackend;
use crate::buffer::BufferDesc;

#[derive(Debug)]
struct StagedBuffer {
    bytes: Vec<u8>,
    timestamp_us: i64,
    eos: bool,
}

#[derive(Debug)]
struct Frame {
    bytes: Vec<u8>,
    timestamp_us: i64,
}

/// Passthrough codec: input bytes out, one frame per input buffer.
#[derive(Debug, Default)]
pub struct LoopbackCodec {
    started: bool,
    lockable: bool,
    staged: HashMap<u32, StagedBuffer>,
    ready: VecDeque<Frame>,
    free_outputs: VecDeque<u32>,
    filled: HashMap<u32, Frame>,
    event: bool,
    announced: bool,
}

impl LoopbackCodec {
    pub fn new() -> Self {
        LoopbackCodec {
            lockable: true,
            ..Default::default()
        }
    }

    /// Frames consumed from input but not yet bound to an output slot.
    pub fn pending_frames(&self) -> usize {
        self.ready.len()
    }

    /// Whether the device currently allows blocking on internal resources
    /// (tracks the `release_codec_lock` hook).
    pub fn is_lockable(&self) -> bool {
        self.lockable
    }
}

impl CodecBackend for LoopbackCodec {
    fn start(&mut self) -> bool {
        self.started = true;
        true
    }

    fn stop(&mut self) -> bool {
        self.started = false;
        self.staged.clear();
        self.ready.clear();
        self.free_outputs.clear();
        self.filled.clear();
        self.event = false;
        self.announced = false;
        true
    }

    fn flush(&mut self) {
        self.staged.clear();
    }

    fn accept_input_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> bool {
        let used = desc.bytes_used() as usize;
        let bytes = data[..used.min(data.len())].to_vec();
        self.staged.insert(
            desc.index,
            StagedBuffer {
                bytes,
                timestamp_us: desc.timestamp_us,
                eos: used == 0,
            },
        );
        true
    }

    fn input_pulse(&mut self, index: u32) -> bool {
        if !self.started {
            return false;
        }
        let staged = match self.staged.remove(&index) {
            Some(staged) => staged,
            None => return false,
        };
        if !staged.eos {
            self.ready.push_back(Frame {
                bytes: staged.bytes,
                timestamp_us: staged.timestamp_us,
            });
            if !self.announced {
                // First consumed frame fixes the stream geometry.
                self.announced = true;
                self.set_codec_event();
            }
        }
        true
    }

    fn output_pulse(&mut self, index: &mut u32) -> bool {
        let slot = match self.free_outputs.pop_front() {
            Some(slot) => slot,
            None => return false,
        };
        if let Some(frame) = self.ready.pop_front() {
            self.filled.insert(slot, frame);
            *index = slot;
            true
        } else {
            self.free_outputs.push_front(slot);
            false
        }
    }

    fn give_output_buffer(&mut self, desc: &mut BufferDesc, data: &mut [u8]) -> bool {
        let frame = match self.filled.remove(&desc.index) {
            Some(frame) => frame,
            None => return false,
        };
        let n = frame.bytes.len().min(data.len());
        data[..n].copy_from_slice(&frame.bytes[..n]);
        if let Some(plane) = desc.planes.first_mut() {
            plane.bytesused = n as u32;
        }
        desc.timestamp_us = frame.timestamp_us;
        true
    }

    fn recycle_output_buffer(&mut self, index: u32) -> bool {
        self.filled.remove(&index);
        self.free_outputs.retain(|slot| *slot != index);
        self.free_outputs.push_back(index);
        true
    }

    fn release_codec_lock(&mut self, lockable: bool) {
        // No internal waits to break out of; recorded for inspection.
        self.lockable = lockable;
    }

    fn has_codec_event(&self) -> bool {
        self.event
    }

    fn set_codec_event(&mut self) {
        self.event = true;
    }

    fn clear_codec_event(&mut self) {
        self.event = false;
    }
}
