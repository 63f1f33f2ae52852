// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Session lifecycle tests for the virtual codec device.
//
// TESTING LAYERS:
//
// Layer 1 (Protocol - loopback backend):
//   - test_input_fifo_order: INPUT buffers complete in submission order
//   - test_qbuf_before_streamon: queueing ahead of STREAMON is legal
//   - test_eos_drain_then_resume: end-of-stream drains OUTPUT, INPUT resumes
//   - test_mmap_roundtrip: bytes written to an input slot come back out
//   - test_codec_event_surfaces: resolution-change event via poll/DQEVENT
//   - test_poll_interrupt: interrupt unblocks a blocked poll
//
// Layer 2 (Rendezvous - scripted mock backend):
//   - test_reqbufs_release_with_pending_work: REQBUFS(0) parks the worker,
//     clears the queues and forbids further QBUF
//   - test_reqbufs_reallocation_generation: no pulse ever executes against a
//     pre-reallocation buffer
//   - test_streamoff_output_with_slow_pulse: STREAMOFF waits out a backend
//     stuck inside a pulse and freezes the done queue
//
// All tests run against the in-process emulation; no hardware or kernel
// device is required.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use codecshim::backend::CodecBackend;
use codecshim::buffer::{
    BufType, BufferDesc, CodecEvent, Format, FrameMemory, MemoryType, RequestBuffers,
};
use codecshim::device::{CodecDevice, Config};
use codecshim::fourcc::FourCC;
use codecshim::loopback::LoopbackCodec;

const DEADLINE: Duration = Duration::from_secs(5);

/// Retry DQBUF until it succeeds or the deadline passes.
fn dqbuf_retry<B: CodecBackend>(
    dev: &CodecDevice<B>,
    buf_type: BufType,
    planes: u32,
) -> BufferDesc {
    let start = Instant::now();
    let mut buf = BufferDesc::new(buf_type, MemoryType::Mmap, 0, planes);
    loop {
        match dev.dqbuf(&mut buf) {
            Ok(()) => return buf,
            Err(err) if err.is_again() => {
                assert!(start.elapsed() < DEADLINE, "timed out waiting for {}", buf_type);
                thread::sleep(Duration::from_millis(1));
            }
            Err(err) => panic!("dqbuf failed: {}", err),
        }
    }
}

fn loopback_device() -> CodecDevice<LoopbackCodec> {
    let dev = CodecDevice::open(LoopbackCodec::new(), Config::default()).unwrap();
    dev.set_frame_memory_type(FrameMemory::RawCopy).unwrap();
    dev.set_format(
        BufType::OutputMplane,
        Format::single_plane(FourCC(*b"H264"), 320, 240, 256),
    )
    .unwrap();
    dev.set_format(
        BufType::CaptureMplane,
        Format::single_plane(FourCC(*b"NV12"), 320, 240, 256),
    )
    .unwrap();
    dev
}

fn request(dev: &CodecDevice<LoopbackCodec>, buf_type: BufType, count: u32) -> u32 {
    let mut req = RequestBuffers::new(buf_type, MemoryType::Mmap, count);
    dev.req_bufs(&mut req).unwrap()
}

fn queue_input(dev: &CodecDevice<LoopbackCodec>, index: u32, payload: &[u8]) {
    dev.map_buffer(BufType::OutputMplane, index, 0).unwrap()[..payload.len()]
        .copy_from_slice(payload);
    let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, index, 1);
    buf.planes[0].bytesused = payload.len() as u32;
    buf.timestamp_us = index as i64 * 1000;
    dev.qbuf(&mut buf).unwrap();
}

fn queue_output(dev: &CodecDevice<LoopbackCodec>, index: u32) {
    let mut buf = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, index, 1);
    dev.qbuf(&mut buf).unwrap();
}

#[test]
fn test_input_fifo_order() {
    let dev = loopback_device();
    request(&dev, BufType::OutputMplane, 4);
    request(&dev, BufType::CaptureMplane, 4);

    dev.stream_on(BufType::OutputMplane).unwrap();
    dev.stream_on(BufType::CaptureMplane).unwrap();
    for i in 0..3 {
        queue_input(&dev, i, b"frame");
    }
    for i in 0..4 {
        queue_output(&dev, i);
    }

    for expected in 0..3 {
        let buf = dqbuf_retry(&dev, BufType::OutputMplane, 1);
        assert_eq!(buf.index, expected, "input buffers must dequeue in FIFO order");
    }

    dev.close().unwrap();
}

#[test]
fn test_qbuf_before_streamon() {
    // REQBUFS(INPUT, 4) -> QBUF(0), QBUF(1) -> STREAMON -> DQBUF 0 then 1.
    let dev = loopback_device();
    assert_eq!(request(&dev, BufType::OutputMplane, 4), 4);

    queue_input(&dev, 0, b"first");
    queue_input(&dev, 1, b"second");
    dev.stream_on(BufType::OutputMplane).unwrap();

    assert_eq!(dqbuf_retry(&dev, BufType::OutputMplane, 1).index, 0);
    assert_eq!(dqbuf_retry(&dev, BufType::OutputMplane, 1).index, 1);

    dev.close().unwrap();
}

#[test]
fn test_eos_drain_then_resume() {
    let dev = loopback_device();
    request(&dev, BufType::OutputMplane, 6);
    request(&dev, BufType::CaptureMplane, 6);
    dev.stream_on(BufType::OutputMplane).unwrap();
    dev.stream_on(BufType::CaptureMplane).unwrap();

    for i in 0..6 {
        queue_output(&dev, i);
    }
    for i in 0..3 {
        queue_input(&dev, i, format!("frame-{}", i).as_bytes());
    }
    // Empty payload is the end-of-stream marker.
    let mut eos = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, 3, 1);
    dev.qbuf(&mut eos).unwrap();

    // Everything submitted before the marker must drain to the client.
    for _ in 0..3 {
        let buf = dqbuf_retry(&dev, BufType::CaptureMplane, 1);
        assert!(buf.planes[0].bytesused > 0);
    }
    // The marker itself completes on the input side.
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(dqbuf_retry(&dev, BufType::OutputMplane, 1).index);
    }
    assert_eq!(seen, vec![0, 1, 2, 3]);

    // The handshake must have returned to Normal: the input worker accepts
    // and processes new work.
    queue_input(&dev, 0, b"after-eos");
    let buf = dqbuf_retry(&dev, BufType::CaptureMplane, 1);
    assert_eq!(buf.planes[0].bytesused, b"after-eos".len() as u32);

    dev.close().unwrap();
}

#[test]
fn test_mmap_roundtrip() {
    let dev = loopback_device();
    request(&dev, BufType::OutputMplane, 2);
    request(&dev, BufType::CaptureMplane, 2);
    dev.stream_on(BufType::OutputMplane).unwrap();
    dev.stream_on(BufType::CaptureMplane).unwrap();

    queue_output(&dev, 0);
    queue_output(&dev, 1);
    let payload = b"annex-b bitstream bytes";
    queue_input(&dev, 0, payload);

    let buf = dqbuf_retry(&dev, BufType::CaptureMplane, 1);
    assert_eq!(buf.planes[0].bytesused as usize, payload.len());
    let mapped = dev.map_buffer(BufType::CaptureMplane, buf.index, 0).unwrap();
    assert_eq!(&mapped[..payload.len()], payload);

    dev.close().unwrap();
}

#[test]
fn test_codec_event_surfaces() {
    let dev = loopback_device();
    request(&dev, BufType::OutputMplane, 2);
    request(&dev, BufType::CaptureMplane, 2);
    dev.stream_on(BufType::OutputMplane).unwrap();
    dev.stream_on(BufType::CaptureMplane).unwrap();

    queue_output(&dev, 0);
    queue_input(&dev, 0, b"header");

    // The loopback codec raises the event on its first consumed frame, so
    // by the time the frame is dequeueable the event must be pending.
    let _ = dqbuf_retry(&dev, BufType::CaptureMplane, 1);
    let event_pending = dev.poll(true).unwrap();
    assert!(event_pending);
    assert_eq!(
        dev.dequeue_event().unwrap(),
        Some(CodecEvent::ResolutionChange)
    );
    assert_eq!(dev.dequeue_event().unwrap(), None);

    dev.close().unwrap();
}

#[test]
fn test_poll_interrupt() {
    let dev = Arc::new(loopback_device());
    let poller = {
        let dev = Arc::clone(&dev);
        thread::spawn(move || dev.poll(false))
    };
    thread::sleep(Duration::from_millis(20));
    dev.set_poll_interrupt().unwrap();
    let event_pending = poller.join().unwrap().unwrap();
    assert!(!event_pending);
    dev.clear_poll_interrupt().unwrap();
}

// ---------------------------------------------------------------------------
// Scripted mock backend for the rendezvous tests.

#[derive(Default)]
struct MockState {
    input_busy: bool,
    pulsed_inputs: Vec<u32>,
    output_plan: VecDeque<u32>,
    output_pulse_delay: Option<Duration>,
    give_calls: usize,
    release_calls: Vec<bool>,
    flushed: bool,
}

#[derive(Clone)]
struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    fn new() -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            MockBackend {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl CodecBackend for MockBackend {
    fn start(&mut self) -> bool {
        true
    }

    fn stop(&mut self) -> bool {
        true
    }

    fn flush(&mut self) {
        self.state.lock().unwrap().flushed = true;
    }

    fn accept_input_buffer(&mut self, _desc: &BufferDesc, _data: &[u8]) -> bool {
        true
    }

    fn input_pulse(&mut self, index: u32) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.input_busy {
            return false;
        }
        state.pulsed_inputs.push(index);
        true
    }

    fn output_pulse(&mut self, index: &mut u32) -> bool {
        let delay = self.state.lock().unwrap().output_pulse_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        match self.state.lock().unwrap().output_plan.pop_front() {
            Some(slot) => {
                *index = slot;
                true
            }
            None => false,
        }
    }

    fn give_output_buffer(&mut self, _desc: &mut BufferDesc, _data: &mut [u8]) -> bool {
        self.state.lock().unwrap().give_calls += 1;
        true
    }

    fn release_codec_lock(&mut self, lockable: bool) {
        self.state.lock().unwrap().release_calls.push(lockable);
    }
}

fn mock_device() -> (CodecDevice<MockBackend>, Arc<Mutex<MockState>>) {
    let (backend, state) = MockBackend::new();
    let dev = CodecDevice::open(backend, Config::default()).unwrap();
    dev.set_frame_memory_type(FrameMemory::RawCopy).unwrap();
    dev.set_format(
        BufType::OutputMplane,
        Format::single_plane(FourCC(*b"H264"), 320, 240, 64),
    )
    .unwrap();
    dev.set_format(
        BufType::CaptureMplane,
        Format::single_plane(FourCC(*b"NV12"), 320, 240, 64),
    )
    .unwrap();
    (dev, state)
}

fn queue_mock_input(dev: &CodecDevice<MockBackend>, index: u32) {
    let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, index, 1);
    buf.planes[0].bytesused = 8;
    dev.qbuf(&mut buf).unwrap();
}

#[test]
fn test_reqbufs_release_with_pending_work() {
    let (dev, state) = mock_device();
    let mut req = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 4);
    dev.req_bufs(&mut req).unwrap();

    state.lock().unwrap().input_busy = true;
    dev.stream_on(BufType::OutputMplane).unwrap();
    queue_mock_input(&dev, 0);
    queue_mock_input(&dev, 1);
    // Let the worker hit the busy backend and park.
    thread::sleep(Duration::from_millis(30));

    // Destroy the queue while two entries are pending: must rendezvous with
    // the worker, then clear everything.
    let mut release = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 0);
    assert_eq!(dev.req_bufs(&mut release).unwrap(), 0);

    // Queue is gone: no further QBUF, no buffer ever reached the backend.
    let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, 0, 1);
    buf.planes[0].bytesused = 8;
    assert!(dev.qbuf(&mut buf).is_err());
    assert!(state.lock().unwrap().pulsed_inputs.is_empty());
    // The unblocking hook ran on entry (false) and on completion (true).
    let releases = state.lock().unwrap().release_calls.clone();
    assert!(releases.contains(&false));
    assert_eq!(releases.last(), Some(&true));

    dev.close().unwrap();
}

#[test]
fn test_reqbufs_reallocation_generation() {
    let (dev, state) = mock_device();
    let mut req = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 4);
    dev.req_bufs(&mut req).unwrap();

    state.lock().unwrap().input_busy = true;
    dev.stream_on(BufType::OutputMplane).unwrap();
    queue_mock_input(&dev, 0);
    queue_mock_input(&dev, 1);
    thread::sleep(Duration::from_millis(30));

    // Reallocate mid-stream, then let the backend accept work again.
    let mut realloc = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 4);
    dev.req_bufs(&mut realloc).unwrap();
    state.lock().unwrap().input_busy = false;
    queue_mock_input(&dev, 3);

    let start = Instant::now();
    loop {
        if !state.lock().unwrap().pulsed_inputs.is_empty() {
            break;
        }
        assert!(start.elapsed() < DEADLINE, "pulse never arrived");
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(30));
    // Only the post-reallocation buffer was ever pulsed.
    assert_eq!(state.lock().unwrap().pulsed_inputs, vec![3]);

    dev.close().unwrap();
}

#[test]
fn test_streamoff_output_with_slow_pulse() {
    let (dev, state) = mock_device();
    let mut req = RequestBuffers::new(BufType::CaptureMplane, MemoryType::Mmap, 4);
    dev.req_bufs(&mut req).unwrap();

    // Every pulse blocks inside the backend for a while, then reports busy.
    state.lock().unwrap().output_pulse_delay = Some(Duration::from_millis(100));
    dev.stream_on(BufType::CaptureMplane).unwrap();
    let mut buf = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, 0, 1);
    dev.qbuf(&mut buf).unwrap();
    // Give the worker time to enter the slow pulse.
    thread::sleep(Duration::from_millis(20));

    dev.stream_off(BufType::CaptureMplane).unwrap();

    // The worker is gone and the done queue is frozen: DQBUF keeps
    // reporting empty and the backend never translated a buffer.
    let mut out = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, 0, 1);
    assert!(dev.dqbuf(&mut out).unwrap_err().is_again());
    thread::sleep(Duration::from_millis(150));
    assert!(dev.dqbuf(&mut out).unwrap_err().is_again());
    assert_eq!(state.lock().unwrap().give_calls, 0);

    dev.close().unwrap();
}

#[test]
fn test_streamoff_input_flushes_backend() {
    let (dev, state) = mock_device();
    let mut req = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, 2);
    dev.req_bufs(&mut req).unwrap();
    dev.stream_on(BufType::OutputMplane).unwrap();
    dev.stream_off(BufType::OutputMplane).unwrap();
    assert!(state.lock().unwrap().flushed);
    dev.close().unwrap();
}

#[test]
fn test_output_completion_order_is_backend_decided() {
    let (dev, state) = mock_device();
    let mut req = RequestBuffers::new(BufType::CaptureMplane, MemoryType::Mmap, 4);
    dev.req_bufs(&mut req).unwrap();

    // The backend completes slot 2 first although 0 was submitted first.
    state
        .lock()
        .unwrap()
        .output_plan
        .extend([2u32, 0, 1]);
    for i in 0..3 {
        let mut buf = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, i, 1);
        dev.qbuf(&mut buf).unwrap();
    }
    dev.stream_on(BufType::CaptureMplane).unwrap();

    let order: Vec<u32> = (0..3)
        .map(|_| dqbuf_retry(&dev, BufType::CaptureMplane, 1).index)
        .collect();
    assert_eq!(order, vec![2, 0, 1]);

    dev.close().unwrap();
}
