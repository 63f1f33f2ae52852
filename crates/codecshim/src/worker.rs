// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Per-port worker thread
//!
//! One worker per direction pumps buffers through the codec backend. Each
//! iteration inspects the queues under the port lock, releases it, and only
//! then calls into the backend; backend calls never run under a port lock
//! because they may block or call back into the device.
//!
//! The loop has three rendezvous besides plain queue work:
//!
//! - REQBUFS park: on `Request` the worker flips to `Acknowledge` at the top
//!   of its loop and sleeps until the client finishes reallocating. The top
//!   of the loop is the one point where the worker holds no buffer.
//! - EOS handshake: when the end-of-stream marker completes on INPUT, the
//!   input worker parks until the output worker has drained everything
//!   submitted before the marker.
//! - Teardown: a false `stream_on` exits the loop; the input worker flushes
//!   the backend on the way out.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::CodecBackend;
use crate::device::{EosState, Shared};
use crate::port::{BufferHandle, Direction, ReqBufState};

/// How long a worker sleeps when the backend reports busy before rechecking.
/// Signals from QBUF or the peer worker cut the sleep short; the timeout
/// only covers a wakeup lost between dropping the port lock for a pulse and
/// re-acquiring it to wait.
const BUSY_RECHECK: Duration = Duration::from_millis(10);

enum Step {
    /// `stream_on` went false; leave the loop.
    Exit,
    /// Drain mode with an empty todo queue; end-of-stream is complete.
    Drained,
    /// Conditions may have changed while waiting; recompute from the top.
    Rescan,
    /// Pulse this entry (`true` when it is the end-of-stream marker).
    Pulse(BufferHandle, bool),
}

pub(crate) fn run<B: CodecBackend>(shared: Arc<Shared<B>>, dir: Direction) {
    log::debug!("{:?} worker thread running", dir);
    let cell = &shared.ports[dir.index()];

    loop {
        // Acknowledge end-of-stream before looking at the queues: the input
        // worker raised `Input` and sleeps until we bring it back to Normal.
        if dir == Direction::Output && shared.eos() == EosState::Input {
            let backend = shared.backend.lock().unwrap();
            if shared.eos() == EosState::Input {
                shared.store_eos(EosState::Output);
            }
            drop(backend);
        }
        let draining = dir == Direction::Output && shared.eos() == EosState::Output;

        let step = {
            let mut port = cell.state.lock().unwrap();
            loop {
                if port.reqbuf_state == ReqBufState::Request {
                    port.reqbuf_state = ReqBufState::Acknowledge;
                    cell.cond.notify_all();
                    log::debug!("{:?} worker parked for queue reallocation", dir);
                    while port.reqbuf_state == ReqBufState::Acknowledge && port.stream_on {
                        port = cell.cond.wait(port).unwrap();
                    }
                    continue;
                }
                if !port.stream_on {
                    break Step::Exit;
                }
                match port.todo.front().copied() {
                    Some(handle) if port.is_current(handle) => {
                        let is_eos = port.eos_handle == Some(handle);
                        break Step::Pulse(handle, is_eos);
                    }
                    Some(stale) => {
                        // Left over from before a reallocation; the slot it
                        // names no longer exists.
                        log::debug!(
                            "{:?} dropping stale queue entry {} (generation {})",
                            port.dir,
                            stale.index,
                            stale.generation
                        );
                        port.todo.pop_front();
                    }
                    None => {
                        if draining {
                            break Step::Drained;
                        }
                        port = cell.cond.wait(port).unwrap();
                        break Step::Rescan;
                    }
                }
            }
        };

        let (handle, is_eos) = match step {
            Step::Exit => break,
            Step::Rescan => continue,
            Step::Drained => {
                finish_drain(&shared);
                continue;
            }
            Step::Pulse(handle, is_eos) => (handle, is_eos),
        };

        let mut actual = handle.index;
        let ok = {
            let mut backend = shared.backend.lock().unwrap();
            match dir {
                Direction::Input => backend.input_pulse(handle.index),
                Direction::Output => backend.output_pulse(&mut actual),
            }
        };

        if ok {
            let completed = {
                let mut port = cell.state.lock().unwrap();
                let moved = port.complete(handle, actual);
                if moved && is_eos {
                    // The marker fires once; the slot may be reused for
                    // ordinary data afterwards.
                    port.eos_handle = None;
                }
                moved
            };
            if completed {
                if let Err(e) = shared.events.signal_device() {
                    log::error!("failed to signal device event: {}", e);
                }
                // Progress on one side often unblocks the other, e.g. a
                // consumed input frees a decode slot for output.
                shared.ports[dir.other().index()].cond.notify_all();
                if dir == Direction::Input && is_eos {
                    eos_handshake(&shared);
                }
            } else {
                log::warn!(
                    "{:?} pulse completed stale or unknown buffer {}",
                    dir,
                    actual
                );
            }
        } else if draining {
            // The codec has nothing more to give: every frame submitted
            // before the marker has been delivered.
            finish_drain(&shared);
        } else {
            let port = cell.state.lock().unwrap();
            let _ = cell.cond.wait_timeout(port, BUSY_RECHECK).unwrap();
        }
    }

    if dir == Direction::Input {
        shared.backend.lock().unwrap().flush();
    } else if shared.eos() != EosState::Normal {
        // Torn down mid-drain: don't strand the input worker in the
        // handshake.
        let backend = shared.backend.lock().unwrap();
        shared.store_eos(EosState::Normal);
        drop(backend);
        shared.codec_cond.notify_all();
        shared.ports[Direction::Input.index()].cond.notify_all();
    }

    {
        let mut port = cell.state.lock().unwrap();
        // A client may have requested reallocation after teardown began;
        // grant the acknowledge so it does not wait on a dead thread.
        if port.reqbuf_state == ReqBufState::Request {
            port.reqbuf_state = ReqBufState::Acknowledge;
        }
        port.thread_on = false;
    }
    cell.cond.notify_all();
    log::debug!("{:?} worker thread exited", dir);
}

/// Raise `EosState::Input` and park until the output side drains.
fn eos_handshake<B: CodecBackend>(shared: &Shared<B>) {
    {
        let backend = shared.backend.lock().unwrap();
        shared.store_eos(EosState::Input);
        drop(backend);
    }
    shared.ports[Direction::Output.index()].cond.notify_all();
    shared.codec_cond.notify_all();
    log::debug!("end-of-stream reached, input parked until output drains");

    let mut backend = shared.backend.lock().unwrap();
    while shared.eos() != EosState::Normal
        && shared.running[Direction::Input.index()].load(Ordering::Acquire)
    {
        let (guard, _) = shared
            .codec_cond
            .wait_timeout(backend, BUSY_RECHECK)
            .unwrap();
        backend = guard;
    }
}

/// Return `EosState` to `Normal` and wake the parked input worker.
fn finish_drain<B: CodecBackend>(shared: &Shared<B>) {
    {
        let backend = shared.backend.lock().unwrap();
        if shared.eos() == EosState::Output {
            shared.store_eos(EosState::Normal);
        }
        drop(backend);
    }
    shared.codec_cond.notify_all();
    shared.ports[Direction::Input.index()].cond.notify_all();
    log::debug!("output drain complete, input resumes");
}
