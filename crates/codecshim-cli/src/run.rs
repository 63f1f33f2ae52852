// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Synthetic session runner: pushes generated "bitstream" buffers through
//! the loopback codec and measures round-trip throughput. Exercises the
//! full session lifecycle a real client would: format negotiation, REQBUFS,
//! pre-queueing, STREAMON, the poll loop, end-of-stream, STREAMOFF.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

use codecshim::buffer::{BufType, BufferDesc, Format, FrameMemory, MemoryType, RequestBuffers};
use codecshim::device::{CodecDevice, Config};
use codecshim::fourcc::FourCC;
use codecshim::loopback::LoopbackCodec;

use crate::error::CliError;

#[derive(Parser, Debug)]
pub struct Args {
    /// Number of frames to push through the codec
    #[arg(short, long, default_value_t = 64)]
    frames: u32,

    /// Payload bytes per frame
    #[arg(short, long, default_value_t = 4096)]
    payload: u32,

    /// INPUT (bitstream) queue depth
    #[arg(long, default_value_t = 4)]
    input_buffers: u32,

    /// OUTPUT (frame) queue depth
    #[arg(long, default_value_t = 4)]
    output_buffers: u32,
}

#[derive(Debug, Serialize)]
struct RunMetrics {
    frames: u32,
    bytes: u64,
    elapsed_ms: u64,
    fps: f64,
    resolution_events: u32,
    interrupted: bool,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    if args.frames == 0 || args.payload == 0 {
        return Err(CliError::InvalidArgs(
            "frames and payload must be non-zero".into(),
        ));
    }

    let device = Arc::new(CodecDevice::open(LoopbackCodec::new(), Config::default())?);
    device.set_frame_memory_type(FrameMemory::RawCopy)?;
    device.set_format(
        BufType::OutputMplane,
        Format::single_plane(FourCC(*b"H264"), 1920, 1080, args.payload),
    )?;
    device.set_format(
        BufType::CaptureMplane,
        Format::single_plane(FourCC(*b"NV12"), 1920, 1080, args.payload),
    )?;

    let mut req = RequestBuffers::new(BufType::OutputMplane, MemoryType::Mmap, args.input_buffers);
    let in_count = device.req_bufs(&mut req)?;
    let mut req =
        RequestBuffers::new(BufType::CaptureMplane, MemoryType::Mmap, args.output_buffers);
    let out_count = device.req_bufs(&mut req)?;
    log::info!("queues allocated: {} in / {} out", in_count, out_count);

    // SIGINT interrupts a blocked poll so the session can wind down cleanly.
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut signals =
        Signals::new([SIGINT]).map_err(|e| CliError::General(format!("signal setup: {}", e)))?;
    {
        let device = Arc::clone(&device);
        let interrupted = Arc::clone(&interrupted);
        thread::spawn(move || {
            if signals.forever().next().is_some() {
                log::warn!("interrupt received, stopping session");
                interrupted.store(true, Ordering::Release);
                let _ = device.set_poll_interrupt();
            }
        });
    }

    device.stream_on(BufType::OutputMplane)?;
    device.stream_on(BufType::CaptureMplane)?;

    for index in 0..out_count {
        let mut buf = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, index, 1);
        device.qbuf(&mut buf)?;
    }

    let mut sent = 0u32;
    let mut eos_sent = false;
    let preload = args.frames.min(in_count);
    for index in 0..preload {
        fill_and_queue(&device, index, sent, args.payload)?;
        sent += 1;
    }
    if sent == args.frames && preload < in_count {
        send_eos(&device, preload)?;
        eos_sent = true;
    }

    let mut received = 0u32;
    let mut bytes = 0u64;
    let mut resolution_events = 0u32;
    let start = Instant::now();

    while received < args.frames && !interrupted.load(Ordering::Acquire) {
        let event_pending = device.poll(true)?;
        if event_pending && device.dequeue_event()?.is_some() {
            resolution_events += 1;
            log::debug!("resolution change event observed");
        }

        // Reclaim finished output frames and put the slots back to work.
        let mut buf = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, 0, 1);
        while device.dqbuf(&mut buf).is_ok() {
            received += 1;
            bytes += buf.bytes_used();
            if received == args.frames {
                break;
            }
            let mut requeue = BufferDesc::new(BufType::CaptureMplane, MemoryType::Mmap, buf.index, 1);
            device.qbuf(&mut requeue)?;
        }

        // Reclaim consumed input slots and feed the next frames.
        let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, 0, 1);
        while device.dqbuf(&mut buf).is_ok() {
            if sent < args.frames {
                fill_and_queue(&device, buf.index, sent, args.payload)?;
                sent += 1;
            } else if !eos_sent {
                send_eos(&device, buf.index)?;
                eos_sent = true;
            }
        }
    }

    device.stream_off(BufType::OutputMplane)?;
    device.stream_off(BufType::CaptureMplane)?;
    device.close()?;

    let elapsed = start.elapsed();
    let metrics = RunMetrics {
        frames: received,
        bytes,
        elapsed_ms: elapsed.as_millis() as u64,
        fps: if elapsed.as_secs_f64() > 0.0 {
            received as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        },
        resolution_events,
        interrupted: interrupted.load(Ordering::Acquire),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&metrics)
                .map_err(|e| CliError::General(e.to_string()))?
        );
    } else {
        println!(
            "{} frames ({} bytes) in {} ms: {:.1} fps, {} resolution event(s)",
            metrics.frames, metrics.bytes, metrics.elapsed_ms, metrics.fps, metrics.resolution_events
        );
    }

    if metrics.interrupted {
        return Err(CliError::Interrupted(format!(
            "stopped after {} of {} frames",
            metrics.frames, args.frames
        )));
    }
    Ok(())
}

/// Write a recognizable pattern into an input slot and queue it.
fn fill_and_queue(
    device: &CodecDevice<LoopbackCodec>,
    index: u32,
    sequence: u32,
    payload: u32,
) -> Result<(), CliError> {
    {
        let mut plane = device.map_buffer(BufType::OutputMplane, index, 0)?;
        for (offset, byte) in plane.iter_mut().enumerate() {
            *byte = (sequence as usize + offset) as u8;
        }
    }
    let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, index, 1);
    buf.planes[0].bytesused = payload;
    buf.timestamp_us = sequence as i64 * 33_333;
    device.qbuf(&mut buf)?;
    Ok(())
}

/// Queue the empty end-of-stream marker.
fn send_eos(device: &CodecDevice<LoopbackCodec>, index: u32) -> Result<(), CliError> {
    let mut buf = BufferDesc::new(BufType::OutputMplane, MemoryType::Mmap, index, 1);
    device.qbuf(&mut buf)?;
    log::debug!("end-of-stream marker queued");
    Ok(())
}
