// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Per-direction port state
//!
//! Each direction of the mem2mem device (INPUT = data into the codec,
//! OUTPUT = data out of it) owns a todo queue, a done queue, a reallocation
//! state machine, and optionally an MMAP plane arena. Queue entries carry
//! the generation of the REQBUFS allocation they were queued under; a
//! handle from before a reallocation never reaches the backend.

use std::collections::VecDeque;
use std::ops::Range;

use crate::buffer::{Format, MemoryType};

/// Data-flow direction through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Input = 0,
    Output = 1,
}

impl Direction {
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn other(self) -> Direction {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

/// Buffer-queue reallocation state machine.
///
/// `Normal -> Request -> Acknowledge -> (Released | FormatChanged) -> Normal`.
/// The client drives `Request` and the final resolution; the worker thread
/// only ever flips `Request` into `Acknowledge` at the top of its loop, a
/// designated safe point where it holds no buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReqBufState {
    Normal,
    Request,
    Acknowledge,
    Released,
    FormatChanged,
}

/// A queue entry: slot index tagged with its REQBUFS generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferHandle {
    pub index: u32,
    pub generation: u64,
}

/// Mutable port state, guarded by the port mutex.
#[derive(Debug)]
pub(crate) struct Port {
    pub dir: Direction,
    pub stream_on: bool,
    pub thread_on: bool,
    pub memory: Option<MemoryType>,
    pub format: Option<Format>,
    pub buffer_count: u32,
    pub max_buffers: u32,
    pub generation: u64,
    pub reqbuf_state: ReqBufState,
    /// Queued to the codec, not yet completed. INPUT: strict FIFO.
    /// OUTPUT: completion order is the backend's choice, entries are erased
    /// by value.
    pub todo: VecDeque<BufferHandle>,
    /// Completed, awaiting DQBUF.
    pub done: VecDeque<BufferHandle>,
    /// The queued end-of-stream marker, if any (INPUT only).
    pub eos_handle: Option<BufferHandle>,
}

impl Port {
    pub(crate) fn new(dir: Direction, max_buffers: u32) -> Self {
        Port {
            dir,
            stream_on: false,
            thread_on: false,
            memory: None,
            format: None,
            buffer_count: 0,
            max_buffers,
            generation: 0,
            reqbuf_state: ReqBufState::Normal,
            todo: VecDeque::new(),
            done: VecDeque::new(),
            eos_handle: None,
        }
    }

    /// Whether QBUF/DQBUF may touch the queues right now.
    pub(crate) fn accepting(&self) -> bool {
        matches!(
            self.reqbuf_state,
            ReqBufState::Normal | ReqBufState::FormatChanged
        )
    }

    /// Whether `handle` belongs to the current allocation.
    pub(crate) fn is_current(&self, handle: BufferHandle) -> bool {
        handle.generation == self.generation
    }

    /// Whether `index` sits in todo or done (i.e. is codec-owned).
    pub(crate) fn owns(&self, index: u32) -> bool {
        let h = BufferHandle {
            index,
            generation: self.generation,
        };
        self.todo.contains(&h) || self.done.contains(&h)
    }

    /// Move a pulsed buffer from todo to done.
    ///
    /// `submitted` is the entry the worker peeked; `actual` is the index the
    /// backend reported, which for OUTPUT may differ. Returns false when the
    /// entry is stale or unknown, in which case nothing moves.
    pub(crate) fn complete(&mut self, submitted: BufferHandle, actual: u32) -> bool {
        if !self.is_current(submitted) {
            return false;
        }
        let target = BufferHandle {
            index: actual,
            generation: submitted.generation,
        };
        match self.todo.iter().position(|h| *h == target) {
            Some(pos) => {
                self.todo.remove(pos);
                self.done.push_back(target);
                true
            }
            None => false,
        }
    }

    /// Clear both queues and the EOS marker, advancing to a new generation.
    pub(crate) fn reallocate(&mut self, count: u32) {
        self.todo.clear();
        self.done.clear();
        self.eos_handle = None;
        self.generation += 1;
        self.buffer_count = count;
        self.reqbuf_state = if count == 0 {
            ReqBufState::Released
        } else {
            ReqBufState::FormatChanged
        };
    }
}

/// MMAP plane arena for one port: `count x plane_count` planes of
/// `plane_size` bytes each, contiguous. Guarded by its own mutex so clients
/// can fill buffers without stalling the port's worker.
#[derive(Debug, Default)]
pub(crate) struct PortStorage {
    pub count: u32,
    pub plane_count: u32,
    pub plane_size: u32,
    pub bytes: Vec<u8>,
}

impl PortStorage {
    pub(crate) fn resize(&mut self, count: u32, plane_count: u32, plane_size: u32) {
        self.count = count;
        self.plane_count = plane_count;
        self.plane_size = plane_size;
        let total = count as usize * plane_count as usize * plane_size as usize;
        self.bytes.clear();
        self.bytes.resize(total, 0);
    }

    /// Byte range of one plane within the arena.
    pub(crate) fn plane_range(&self, index: u32, plane: u32) -> Option<Range<usize>> {
        if index >= self.count || plane >= self.plane_count {
            return None;
        }
        let plane_size = self.plane_size as usize;
        let start = (index as usize * self.plane_count as usize + plane as usize) * plane_size;
        Some(start..start + plane_size)
    }

    /// Byte range of a whole buffer slot (all planes).
    pub(crate) fn slot_range(&self, index: u32) -> Option<Range<usize>> {
        if index >= self.count {
            return None;
        }
        let slot = self.plane_count as usize * self.plane_size as usize;
        let start = index as usize * slot;
        Some(start..start + slot)
    }
}
