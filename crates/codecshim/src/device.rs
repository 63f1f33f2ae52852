// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Virtual V4L2 stateful-codec device
//!
//! [`CodecDevice`] reproduces the kernel mem2mem session protocol in
//! userspace: typed equivalents of QUERYCAP, S_FMT/G_FMT, REQBUFS, QBUF,
//! DQBUF, STREAMON, STREAMOFF, DQEVENT, an mmap-style buffer accessor, and a
//! `poll()` built on an eventfd pair. The actual codec work is delegated to
//! a [`CodecBackend`] pumped by one worker thread per direction.
//!
//! Where the kernel funnels every command through `ioctl(int, void*)` and
//! casts per command, each command here takes its own payload type, so the
//! compiler enforces what the kernel checks at runtime.
//!
//! # Ownership rules
//!
//! A buffer index belongs to exactly one owner at a time: the client (before
//! QBUF or after DQBUF), the todo queue, the backend (during a pulse), or
//! the done queue. QBUF of an index the device still owns is rejected.
//! Queue entries are tagged with the generation of their REQBUFS allocation
//! and entries from a previous generation are discarded unpulsed.
//!
//! # Example
//!
//! ```no_run
//! use codecshim::buffer::{BufType, BufferDesc, Format, FrameMemory, MemoryType, RequestBuffers};
//! use codecshim::device::{CodecDevice, Config};
//! use codecshim::fourcc::FourCC;
//! use codecshim::loopback::LoopbackCodec;
//!
//! let device = CodecDevice::open(LoopbackCodec::new(), Config::default())?;
//! device.set_frame_memory_type(FrameMemory::RawCopy)?;
//! device.set_format(BufType::OutputMplane, Format::single_plane(FourCC(*b"H264"), 320, 240, 65536))?;
//! let mut req = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 4);
//! let granted = device.req_bufs(&mut req)?;
//! assert!(granted > 0);
//! # Ok::<(), codecshim::Error>(())
//! ```

use std::ops::{Deref, DerefMut, Range};
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::backend::CodecBackend;
use crate::buffer::{
    BufType, BufferDesc, Capability, CodecEvent, Format, FrameMemory, MemoryType, PlaneLayout,
    RequestBuffers, CAP_STREAMING, CAP_VIDEO_CAPTURE_MPLANE, CAP_VIDEO_OUTPUT_MPLANE, MAX_PLANES,
};
use crate::event::EventChannel;
use crate::port::{BufferHandle, Direction, Port, PortStorage, ReqBufState};
use crate::worker;
use crate::Error;

/// How often STREAMOFF re-signals a worker that has not yet observed the
/// stopped flag.
const STREAMOFF_RECHECK: Duration = Duration::from_millis(2);

/// End-of-stream handshake state, shared by both workers.
///
/// `Input` is raised by the input worker when the end-of-stream marker
/// completes; the output worker acknowledges with `Output` while it drains
/// and restores `Normal` once everything submitted before the marker has
/// been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum EosState {
    Normal = 0,
    Input = 1,
    Output = 2,
}

impl EosState {
    fn from_u8(value: u8) -> EosState {
        match value {
            1 => EosState::Input,
            2 => EosState::Output,
            _ => EosState::Normal,
        }
    }
}

/// One port's lock/condvar pair.
pub(crate) struct PortCell {
    pub state: Mutex<Port>,
    pub cond: Condvar,
}

/// State shared between the client-facing device handle and the workers.
pub(crate) struct Shared<B> {
    pub ports: [PortCell; 2],
    pub storage: [Mutex<PortStorage>; 2],
    /// The codec lock: serializes every backend call and orders `EosState`
    /// transitions. Held only across individual calls, never across a
    /// blocking wait.
    pub backend: Mutex<B>,
    pub codec_cond: Condvar,
    eos: AtomicU8,
    /// Mirror of each port's `stream_on`, readable without the port lock.
    pub running: [AtomicBool; 2],
    pub events: EventChannel,
}

impl<B> Shared<B> {
    pub(crate) fn eos(&self) -> EosState {
        EosState::from_u8(self.eos.load(Ordering::Acquire))
    }

    /// Store a new `EosState`. Callers hold the backend lock, which is what
    /// orders transitions between the two workers.
    pub(crate) fn store_eos(&self, state: EosState) {
        self.eos.store(state as u8, Ordering::Release);
    }
}

/// Device construction parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ceiling on the INPUT (bitstream/raw-in) queue size
    pub max_input_buffers: u32,
    /// Ceiling on the OUTPUT (decoded/encoded-out) queue size
    pub max_output_buffers: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_input_buffers: 8,
            max_output_buffers: 32,
        }
    }
}

/// The virtual stateful-codec device.
///
/// All methods take `&self`; the device may be shared across threads behind
/// an [`Arc`], matching a V4L2 fd shared across an application. QBUF and
/// DQBUF never block: they fail fast with [`Error::Again`] and the caller
/// waits in [`CodecDevice::poll`] instead.
pub struct CodecDevice<B: CodecBackend + 'static> {
    shared: Arc<Shared<B>>,
    workers: [Mutex<Option<thread::JoinHandle<()>>>; 2],
    frame_memory: Mutex<Option<FrameMemory>>,
    closed: AtomicBool,
}

fn dir_of(buf_type: BufType) -> Direction {
    match buf_type {
        BufType::OutputMplane => Direction::Input,
        BufType::CaptureMplane => Direction::Output,
    }
}

/// QBUF/DQBUF admission against the reallocation state machine.
fn check_queue_access(port: &Port) -> Result<(), Error> {
    match port.reqbuf_state {
        ReqBufState::Released => Err(Error::InvalidState("queue released")),
        ReqBufState::Request | ReqBufState::Acknowledge => Err(Error::Again),
        ReqBufState::Normal | ReqBufState::FormatChanged => Ok(()),
    }
}

impl<B: CodecBackend + 'static> CodecDevice<B> {
    /// Open the virtual device around `backend`.
    ///
    /// Creates both ports and the event channel. Worker threads are not
    /// started until STREAMON.
    pub fn open(backend: B, config: Config) -> Result<Self, Error> {
        let shared = Shared {
            ports: [
                PortCell {
                    state: Mutex::new(Port::new(Direction::Input, config.max_input_buffers)),
                    cond: Condvar::new(),
                },
                PortCell {
                    state: Mutex::new(Port::new(Direction::Output, config.max_output_buffers)),
                    cond: Condvar::new(),
                },
            ],
            storage: [
                Mutex::new(PortStorage::default()),
                Mutex::new(PortStorage::default()),
            ],
            backend: Mutex::new(backend),
            codec_cond: Condvar::new(),
            eos: AtomicU8::new(EosState::Normal as u8),
            running: [AtomicBool::new(false), AtomicBool::new(false)],
            events: EventChannel::new()?,
        };
        log::info!(
            "codec device opened (max buffers: {} in / {} out)",
            config.max_input_buffers,
            config.max_output_buffers
        );
        Ok(CodecDevice {
            shared: Arc::new(shared),
            workers: [Mutex::new(None), Mutex::new(None)],
            frame_memory: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::InvalidState("device closed"))
        } else {
            Ok(())
        }
    }

    /// QUERYCAP: report the mem2mem capability triple.
    pub fn query_cap(&self) -> Capability {
        Capability {
            driver: "codecshim".to_string(),
            card: "codecshim virtual mem2mem".to_string(),
            bus_info: "user:codecshim".to_string(),
            capabilities: CAP_VIDEO_CAPTURE_MPLANE | CAP_VIDEO_OUTPUT_MPLANE | CAP_STREAMING,
        }
    }

    /// Configure how frame payloads travel between client and backend.
    /// Required before STREAMON.
    pub fn set_frame_memory_type(&self, kind: FrameMemory) -> Result<(), Error> {
        self.ensure_open()?;
        *self.frame_memory.lock().unwrap() = Some(kind);
        Ok(())
    }

    /// The configured frame memory type, if any.
    pub fn frame_memory_type(&self) -> Option<FrameMemory> {
        *self.frame_memory.lock().unwrap()
    }

    /// S_FMT: set a port's pixel format and plane sizing.
    ///
    /// Rejected while the port has buffers allocated; release the queue with
    /// REQBUFS(0) first.
    pub fn set_format(&self, buf_type: BufType, format: Format) -> Result<(), Error> {
        self.ensure_open()?;
        if format.plane_count == 0 || format.plane_count > MAX_PLANES {
            return Err(Error::InvalidArgument("plane count"));
        }
        if format.plane_size == 0 {
            return Err(Error::InvalidArgument("plane size"));
        }
        let cell = &self.shared.ports[dir_of(buf_type).index()];
        let mut port = cell.state.lock().unwrap();
        if port.buffer_count > 0 {
            return Err(Error::InvalidState("buffers allocated"));
        }
        log::debug!("{} format set to {}", buf_type, format);
        port.format = Some(format);
        Ok(())
    }

    /// G_FMT: read back a port's format.
    pub fn get_format(&self, buf_type: BufType) -> Result<Format, Error> {
        self.ensure_open()?;
        let cell = &self.shared.ports[dir_of(buf_type).index()];
        let port = cell.state.lock().unwrap();
        port.format.ok_or(Error::NotConfigured("port format"))
    }

    /// REQBUFS: (re)allocate or destroy a port's buffer queue.
    ///
    /// If the port's worker holds pending work, this blocks until the worker
    /// parks at its safe point; the worker is never mid-pulse on a buffer
    /// that is about to be freed. Returns the granted count (capped at the
    /// port's configured maximum), also written back to `req.count`.
    pub fn req_bufs(&self, req: &mut RequestBuffers) -> Result<u32, Error> {
        self.ensure_open()?;
        let dir = dir_of(req.buf_type);
        let cell = &self.shared.ports[dir.index()];

        let mut port = cell.state.lock().unwrap();
        if req.count > 0 && port.format.is_none() {
            return Err(Error::NotConfigured("port format"));
        }
        if port.reqbuf_state == ReqBufState::Request
            || port.reqbuf_state == ReqBufState::Acknowledge
        {
            return Err(Error::Again);
        }

        if port.thread_on && !port.todo.is_empty() {
            log::debug!("{} REQBUFS rendezvous with busy worker", req.buf_type);
            port.reqbuf_state = ReqBufState::Request;
            drop(port);
            // Unblock a backend stuck mid-call so the worker can reach its
            // safe point; restored once the queues are rebuilt.
            self.shared.backend.lock().unwrap().release_codec_lock(false);
            cell.cond.notify_all();
            port = cell.state.lock().unwrap();
            while port.reqbuf_state == ReqBufState::Request {
                port = cell.cond.wait(port).unwrap();
            }
        }

        let granted = if req.count == 0 {
            0
        } else {
            req.count.min(port.max_buffers)
        };
        port.memory = Some(req.memory);
        port.reallocate(granted);
        {
            let mut storage = self.shared.storage[dir.index()].lock().unwrap();
            match (port.format, req.memory) {
                (Some(format), MemoryType::Mmap) => {
                    storage.resize(granted, format.plane_count, format.plane_size)
                }
                _ => storage.resize(0, 0, 0),
            }
        }
        drop(port);

        self.shared.backend.lock().unwrap().release_codec_lock(true);
        cell.cond.notify_all();
        log::debug!("{} queue reallocated: {} buffers", req.buf_type, granted);
        req.count = granted;
        Ok(granted)
    }

    /// QUERYBUF: plane layout of an MMAP buffer for use with
    /// [`CodecDevice::map_buffer`].
    pub fn query_buf(&self, buf_type: BufType, index: u32) -> Result<Vec<PlaneLayout>, Error> {
        self.ensure_open()?;
        let dir = dir_of(buf_type);
        {
            let port = self.shared.ports[dir.index()].state.lock().unwrap();
            if port.memory != Some(MemoryType::Mmap) {
                return Err(Error::InvalidState("queue is not MMAP"));
            }
            if index >= port.buffer_count {
                return Err(Error::InvalidArgument("buffer index"));
            }
        }
        let storage = self.shared.storage[dir.index()].lock().unwrap();
        let mut planes = Vec::with_capacity(storage.plane_count as usize);
        for plane in 0..storage.plane_count {
            let range = storage
                .plane_range(index, plane)
                .ok_or(Error::InvalidArgument("buffer index"))?;
            planes.push(PlaneLayout {
                length: storage.plane_size,
                mem_offset: range.start as u32,
            });
        }
        Ok(planes)
    }

    /// Mmap-style accessor: mutable access to one MMAP plane's bytes.
    ///
    /// The client fills input planes before QBUF and reads output planes
    /// after DQBUF. Mapping a buffer the codec currently owns is a protocol
    /// violation the device does not police, exactly like the kernel
    /// interface it emulates.
    pub fn map_buffer(
        &self,
        buf_type: BufType,
        index: u32,
        plane: u32,
    ) -> Result<MappedPlane<'_>, Error> {
        self.ensure_open()?;
        let dir = dir_of(buf_type);
        let storage = self.shared.storage[dir.index()].lock().unwrap();
        let range = storage
            .plane_range(index, plane)
            .ok_or(Error::InvalidArgument("plane out of range"))?;
        Ok(MappedPlane {
            guard: storage,
            range,
        })
    }

    /// QBUF: hand a buffer to the codec.
    ///
    /// Never blocks. Fails with [`Error::Again`] while the port is between
    /// REQBUFS states.
    pub fn qbuf(&self, buf: &mut BufferDesc) -> Result<(), Error> {
        self.ensure_open()?;
        let dir = dir_of(buf.buf_type);
        let cell = &self.shared.ports[dir.index()];

        let (handle, is_eos) = {
            let port = cell.state.lock().unwrap();
            check_queue_access(&port)?;
            if port.memory != Some(buf.memory) {
                return Err(Error::InvalidArgument("memory mode mismatch"));
            }
            let format = port.format.ok_or(Error::NotConfigured("port format"))?;
            if buf.planes.len() != format.plane_count as usize {
                return Err(Error::InvalidArgument("plane count mismatch"));
            }
            if buf.index >= port.buffer_count {
                return Err(Error::InvalidArgument("buffer index"));
            }
            if buf.memory == MemoryType::Mmap
                && buf.planes.iter().any(|p| p.bytesused > format.plane_size)
            {
                return Err(Error::InvalidArgument("plane payload overflows buffer"));
            }
            if port.owns(buf.index) {
                return Err(Error::InvalidArgument("buffer already queued"));
            }
            let handle = BufferHandle {
                index: buf.index,
                generation: port.generation,
            };
            (handle, buf.is_eos_marker())
        };

        let accepted = match dir {
            Direction::Input => {
                let storage = self.shared.storage[dir.index()].lock().unwrap();
                let data = storage
                    .slot_range(buf.index)
                    .map(|r| &storage.bytes[r])
                    .unwrap_or(&[]);
                self.shared
                    .backend
                    .lock()
                    .unwrap()
                    .accept_input_buffer(buf, data)
            }
            Direction::Output => self
                .shared
                .backend
                .lock()
                .unwrap()
                .recycle_output_buffer(buf.index),
        };
        if !accepted {
            return Err(Error::Rejected(match dir {
                Direction::Input => "input buffer",
                Direction::Output => "output buffer recycle",
            }));
        }

        {
            let mut port = cell.state.lock().unwrap();
            // The queue may have been reallocated between the backend call
            // and here; a handle from the old generation must not land.
            if !port.is_current(handle) || !port.accepting() {
                return Err(Error::Again);
            }
            if is_eos {
                log::debug!("end-of-stream marker queued at index {}", buf.index);
                port.eos_handle = Some(handle);
            }
            if port.reqbuf_state == ReqBufState::FormatChanged {
                port.reqbuf_state = ReqBufState::Normal;
            }
            port.todo.push_back(handle);
        }
        cell.cond.notify_all();
        Ok(())
    }

    /// DQBUF: take back a completed buffer.
    ///
    /// Never blocks: an empty done queue is [`Error::Again`] and every queue
    /// is left untouched. INPUT buffers come back in submission order;
    /// OUTPUT buffers in whatever order the codec finished them.
    pub fn dqbuf(&self, buf: &mut BufferDesc) -> Result<(), Error> {
        self.ensure_open()?;
        let dir = dir_of(buf.buf_type);
        let cell = &self.shared.ports[dir.index()];

        let (handle, plane_count) = {
            let mut port = cell.state.lock().unwrap();
            check_queue_access(&port)?;
            let format = port.format.ok_or(Error::NotConfigured("port format"))?;
            match port.done.pop_front() {
                Some(handle) => (handle, format.plane_count),
                None => return Err(Error::Again),
            }
        };

        buf.index = handle.index;
        buf.planes.clear();
        buf.planes
            .resize(plane_count as usize, Default::default());

        let ok = match dir {
            Direction::Output => {
                let mut storage = self.shared.storage[dir.index()].lock().unwrap();
                match storage.slot_range(handle.index) {
                    Some(range) => {
                        let mut backend = self.shared.backend.lock().unwrap();
                        backend.give_output_buffer(buf, &mut storage.bytes[range])
                    }
                    None => {
                        let mut backend = self.shared.backend.lock().unwrap();
                        backend.give_output_buffer(buf, &mut [])
                    }
                }
            }
            Direction::Input => self.shared.backend.lock().unwrap().recycle_input_buffer(buf),
        };

        if !ok {
            // Put the buffer back where it was; no silent loss.
            let mut port = cell.state.lock().unwrap();
            if port.is_current(handle) {
                port.done.push_front(handle);
            }
            return Err(Error::Rejected("buffer translation"));
        }
        log::trace!("{} dqbuf index {}", buf.buf_type, buf.index);
        Ok(())
    }

    /// STREAMON: start streaming on a queue, spawning its worker.
    ///
    /// For the INPUT queue this also starts the backend. Idempotent.
    pub fn stream_on(&self, buf_type: BufType) -> Result<(), Error> {
        self.ensure_open()?;
        if self.frame_memory.lock().unwrap().is_none() {
            return Err(Error::NotConfigured("frame memory type"));
        }
        let dir = dir_of(buf_type);
        let cell = &self.shared.ports[dir.index()];
        if cell.state.lock().unwrap().stream_on {
            return Ok(());
        }

        if dir == Direction::Input {
            let mut backend = self.shared.backend.lock().unwrap();
            if !backend.start() {
                return Err(Error::Rejected("codec start"));
            }
            backend.release_codec_lock(true);
        }

        let spawn = {
            let mut port = cell.state.lock().unwrap();
            if port.stream_on {
                return Ok(());
            }
            port.stream_on = true;
            self.shared.running[dir.index()].store(true, Ordering::Release);
            if port.thread_on {
                false
            } else {
                port.thread_on = true;
                true
            }
        };

        if spawn {
            let shared = Arc::clone(&self.shared);
            let name = match dir {
                Direction::Input => "codecshim-input",
                Direction::Output => "codecshim-output",
            };
            let spawned = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || worker::run(shared, dir));
            match spawned {
                Ok(handle) => *self.workers[dir.index()].lock().unwrap() = Some(handle),
                Err(err) => {
                    let mut port = cell.state.lock().unwrap();
                    port.stream_on = false;
                    port.thread_on = false;
                    self.shared.running[dir.index()].store(false, Ordering::Release);
                    return Err(err.into());
                }
            }
        }
        log::info!("{} streaming on", buf_type);
        Ok(())
    }

    /// STREAMOFF: stop streaming on a queue and tear down its worker.
    ///
    /// Returns only after the worker observed the stopped flag and exited;
    /// all buffers return to client ownership. Idempotent, and safe against
    /// a backend wedged inside a call thanks to `release_codec_lock`.
    pub fn stream_off(&self, buf_type: BufType) -> Result<(), Error> {
        self.ensure_open()?;
        self.stream_off_inner(buf_type)
    }

    fn stream_off_inner(&self, buf_type: BufType) -> Result<(), Error> {
        let dir = dir_of(buf_type);
        let cell = &self.shared.ports[dir.index()];

        let was_streaming = {
            let mut port = cell.state.lock().unwrap();
            let active = port.stream_on || port.thread_on;
            port.stream_on = false;
            active
        };
        self.shared.running[dir.index()].store(false, Ordering::Release);

        if dir == Direction::Input {
            // Reset the handshake and unblock a backend stuck mid-call so a
            // parked worker cannot deadlock the teardown.
            let mut backend = self.shared.backend.lock().unwrap();
            self.shared.store_eos(EosState::Normal);
            backend.release_codec_lock(false);
            drop(backend);
            self.shared.codec_cond.notify_all();
        }

        if was_streaming {
            loop {
                cell.cond.notify_all();
                self.shared.codec_cond.notify_all();
                {
                    let port = cell.state.lock().unwrap();
                    if !port.thread_on {
                        break;
                    }
                }
                thread::sleep(STREAMOFF_RECHECK);
            }
            if let Some(handle) = self.workers[dir.index()].lock().unwrap().take() {
                let _ = handle.join();
            }
        }

        {
            let mut port = cell.state.lock().unwrap();
            port.todo.clear();
            port.done.clear();
            port.eos_handle = None;
        }
        log::info!("{} streaming off", buf_type);
        Ok(())
    }

    /// Block until the interrupt fires or, with `poll_device`, until codec
    /// progress is signaled. Consumes one unit of progress on return.
    ///
    /// Returns whether a codec-level event (distinct from buffer
    /// completion) is pending; fetch it with [`CodecDevice::dequeue_event`].
    pub fn poll(&self, poll_device: bool) -> Result<bool, Error> {
        self.ensure_open()?;
        self.shared.events.wait(poll_device)?;
        let pending = self.shared.backend.lock().unwrap().has_codec_event();
        self.shared.events.consume_device()?;
        Ok(pending)
    }

    /// Arm the interrupt: force a blocked (or the next) [`CodecDevice::poll`]
    /// to return early.
    pub fn set_poll_interrupt(&self) -> Result<(), Error> {
        self.shared.events.signal_interrupt()
    }

    /// Drain the interrupt counter.
    pub fn clear_poll_interrupt(&self) -> Result<(), Error> {
        self.shared.events.clear_interrupt()
    }

    /// DQEVENT: fetch the pending codec-level event, if any.
    pub fn dequeue_event(&self) -> Result<Option<CodecEvent>, Error> {
        self.ensure_open()?;
        let mut backend = self.shared.backend.lock().unwrap();
        if backend.has_codec_event() {
            backend.clear_codec_event();
            Ok(Some(CodecEvent::ResolutionChange))
        } else {
            Ok(None)
        }
    }

    /// Descriptor signaling `POLLIN` while codec progress is pending, for
    /// folding into an external event loop.
    pub fn device_fd(&self) -> BorrowedFd {
        self.shared.events.device_fd()
    }

    /// Descriptor signaling `POLLIN` once the poll interrupt is armed.
    pub fn interrupt_fd(&self) -> BorrowedFd {
        self.shared.events.interrupt_fd()
    }

    /// Close the device: stop both queues, wait for both workers, stop the
    /// backend. The device rejects further commands afterwards. Idempotent.
    pub fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stream_off_inner(BufType::OutputMplane)?;
        self.stream_off_inner(BufType::CaptureMplane)?;
        if !self.shared.backend.lock().unwrap().stop() {
            log::warn!("codec backend reported failure on stop");
        }
        log::info!("codec device closed");
        Ok(())
    }
}

impl<B: CodecBackend + 'static> Drop for CodecDevice<B> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("error while closing codec device: {}", err);
        }
    }
}

/// Mutable view of one MMAP plane, returned by
/// [`CodecDevice::map_buffer`].
///
/// Holds the port's storage lock for its lifetime; keep mappings short-lived
/// so QBUF/DQBUF on the same port do not stall.
pub struct MappedPlane<'a> {
    guard: MutexGuard<'a, PortStorage>,
    range: Range<usize>,
}

impl Deref for MappedPlane<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard.bytes[self.range.clone()]
    }
}

impl DerefMut for MappedPlane<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard.bytes[self.range.clone()]
    }
}
