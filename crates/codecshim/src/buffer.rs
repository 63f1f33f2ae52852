// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Typed ioctl payloads and format descriptors
//!
//! The kernel multiplexes every V4L2 command through a single
//! `ioctl(int, void*)` entry point and casts the pointer per command. Here
//! each command instead takes a dedicated payload type so the compiler checks
//! what the kernel checks at runtime:
//!
//! - [`BufType`] - which queue a command addresses (INPUT vs OUTPUT port)
//! - [`MemoryType`] - buffer memory mode (MMAP, USERPTR, DMABUF)
//! - [`FrameMemory`] - how frame payloads travel between client and backend
//! - [`Format`] - per-port pixel format and plane sizing (S_FMT/G_FMT)
//! - [`RequestBuffers`] - REQBUFS payload
//! - [`BufferDesc`] / [`PlaneDesc`] - QBUF/DQBUF payload
//! - [`Capability`] - QUERYCAP reply

use std::fmt;

use crate::fourcc::FourCC;

/// Capability bit: the device supports multi-planar video capture.
/// Matches `V4L2_CAP_VIDEO_CAPTURE_MPLANE`.
pub const CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x0000_1000;
/// Capability bit: the device supports multi-planar video output.
/// Matches `V4L2_CAP_VIDEO_OUTPUT_MPLANE`.
pub const CAP_VIDEO_OUTPUT_MPLANE: u32 = 0x0000_2000;
/// Capability bit: the device supports streaming I/O.
/// Matches `V4L2_CAP_STREAMING`.
pub const CAP_STREAMING: u32 = 0x0400_0000;

/// Hard ceiling on planes per buffer, matching `VIDEO_MAX_PLANES`.
pub const MAX_PLANES: u32 = 8;

/// Buffer queue type, following the V4L2 mem2mem naming convention.
///
/// In V4L2 a codec's *input* (bitstream for a decoder, raw frames for an
/// encoder) travels on the `OUTPUT_MPLANE` queue, and its *output* on the
/// `CAPTURE_MPLANE` queue. The names read backwards because they are from
/// the device's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BufType {
    /// Multi-planar output queue: data going *into* the codec.
    OutputMplane = 9,
    /// Multi-planar capture queue: data coming *out of* the codec.
    CaptureMplane = 10,
}

impl fmt::Display for BufType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufType::OutputMplane => write!(f, "OUTPUT_MPLANE"),
            BufType::CaptureMplane => write!(f, "CAPTURE_MPLANE"),
        }
    }
}

/// V4L2 buffer memory mode.
///
/// Only [`MemoryType::Mmap`] buffers are backed by device-owned storage
/// reachable through [`crate::device::CodecDevice::map_buffer`]; for the
/// other modes the payload bytes travel out of band and the backend sees an
/// empty data slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MemoryType {
    /// Device-allocated buffers, accessed through the mmap-style accessor.
    Mmap = 1,
    /// Client-allocated buffers passed by pointer.
    UserPtr = 2,
    /// DMA buffer file descriptors.
    DmaBuf = 4,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryType::Mmap => write!(f, "MMAP"),
            MemoryType::UserPtr => write!(f, "USERPTR"),
            MemoryType::DmaBuf => write!(f, "DMABUF"),
        }
    }
}

/// How decoded/encoded frame payloads are shared with the client.
///
/// Must be configured with
/// [`crate::device::CodecDevice::set_frame_memory_type`] before STREAMON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMemory {
    /// Frame bytes are copied through the device-owned plane arena.
    #[default]
    RawCopy,
    /// Frames are exported as DMA buffer handles by the backend.
    DmaBuf,
    /// Frames are referenced by an external, backend-defined handle.
    External,
}

/// Per-port pixel format and plane sizing (the S_FMT/G_FMT payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Coded or raw pixel format (e.g. "H264", "NV12")
    pub pixel_format: FourCC,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Number of memory planes per buffer (1..=[`MAX_PLANES`])
    pub plane_count: u32,
    /// Bytes reserved per plane in the buffer arena
    pub plane_size: u32,
}

impl Format {
    /// Convenience constructor for the common single-plane layout.
    pub fn single_plane(pixel_format: FourCC, width: u32, height: u32, plane_size: u32) -> Self {
        Format {
            pixel_format,
            width,
            height,
            plane_count: 1,
            plane_size,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} ({} plane(s) x {} bytes)",
            self.pixel_format, self.width, self.height, self.plane_count, self.plane_size
        )
    }
}

/// REQBUFS payload: (re)allocate or destroy a port's buffer queue.
///
/// `count == 0` destroys the queue; the device caps a non-zero count at the
/// port's configured maximum and writes the granted count back.
#[derive(Debug, Clone, Copy)]
pub struct RequestBuffers {
    /// Queue being (re)allocated
    pub buf_type: BufType,
    /// Memory mode for every buffer in the queue
    pub memory: MemoryType,
    /// Requested count in, granted count out
    pub count: u32,
}

impl RequestBuffers {
    pub fn new(buf_type: BufType, memory: MemoryType, count: u32) -> Self {
        RequestBuffers {
            buf_type,
            memory,
            count,
        }
    }
}

/// Per-plane payload accounting within a [`BufferDesc`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaneDesc {
    /// Bytes of payload in this plane
    pub bytesused: u32,
    /// Offset of the payload within the plane
    pub data_offset: u32,
}

/// QBUF/DQBUF payload: one buffer's worth of bookkeeping.
///
/// Queueing an INPUT buffer with zero used bytes across all planes is the
/// end-of-stream marker: the codec drains every frame submitted before it
/// and only then resumes accepting input.
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Queue this buffer belongs to
    pub buf_type: BufType,
    /// Memory mode, must match the queue's REQBUFS mode
    pub memory: MemoryType,
    /// Slot index within the port's buffer array
    pub index: u32,
    /// Presentation timestamp in microseconds, carried through the codec
    pub timestamp_us: i64,
    /// Per-plane payload accounting; length must equal the port's plane count
    pub planes: Vec<PlaneDesc>,
}

impl BufferDesc {
    /// Create a descriptor with `plane_count` zeroed planes.
    pub fn new(buf_type: BufType, memory: MemoryType, index: u32, plane_count: u32) -> Self {
        BufferDesc {
            buf_type,
            memory,
            index,
            timestamp_us: 0,
            planes: vec![PlaneDesc::default(); plane_count as usize],
        }
    }

    /// Total payload bytes across all planes.
    pub fn bytes_used(&self) -> u64 {
        self.planes.iter().map(|p| p.bytesused as u64).sum()
    }

    /// Whether this descriptor is the end-of-stream marker (empty INPUT
    /// buffer).
    pub fn is_eos_marker(&self) -> bool {
        self.buf_type == BufType::OutputMplane && self.bytes_used() == 0
    }
}

/// QUERYCAP reply.
#[derive(Debug, Clone)]
pub struct Capability {
    /// Driver name
    pub driver: String,
    /// Device name
    pub card: String,
    /// Bus the virtual device lives on
    pub bus_info: String,
    /// Capability bitmask ([`CAP_VIDEO_CAPTURE_MPLANE`] etc.)
    pub capabilities: u32,
}

impl Capability {
    /// Whether the mem2mem capability triple is present.
    pub fn is_mem2mem(&self) -> bool {
        let wanted = CAP_VIDEO_CAPTURE_MPLANE | CAP_VIDEO_OUTPUT_MPLANE | CAP_STREAMING;
        self.capabilities & wanted == wanted
    }
}

/// Plane layout reported by QUERYBUF for use with the mmap accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Plane length in bytes
    pub length: u32,
    /// Offset of the plane within the port arena
    pub mem_offset: u32,
}

/// Codec-level event, distinct from buffer completion (DQEVENT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecEvent {
    /// The backend discovered or changed the coded resolution; the client
    /// should re-read the OUTPUT format and reallocate its queue.
    ResolutionChange,
}
