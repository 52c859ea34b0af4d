// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! An in-memory [`CaptureHandle`] test double, in the same spirit as the reference codebase's
//! own test-only trait implementations (e.g. `routing::testfib::TestFib`): a plain, always-built
//! type rather than one gated behind a feature or `cfg(test)`, so it can be used from any other
//! crate's test suite without a dev-dependency cycle.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::error::TransientCaptureError;
use crate::handle::CaptureHandle;
use crate::packet::CapturedPacket;

#[derive(Default)]
struct Inner {
    inbox: VecDeque<CapturedPacket>,
    sent: Vec<CapturedPacket>,
    closed: bool,
}

/// A [`CaptureHandle`] backed by an in-memory queue instead of a real WinDivert handle.
///
/// `recv` blocks on the queue exactly as the real handle blocks in the kernel: a call with
/// nothing queued parks the calling thread until [`FakeCaptureHandle::push`] or
/// [`CaptureHandle::close`] wakes it, so tests can exercise a diverter's real `run()` loop —
/// including the close-unblocks-recv shutdown path — rather than only its `process()` function.
#[derive(Default)]
pub struct FakeCaptureHandle {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl FakeCaptureHandle {
    /// An empty handle with nothing queued and not yet closed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a packet for a future `recv` to return, waking any thread already blocked in one.
    pub fn push(&self, packet: CapturedPacket) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.inbox.push_back(packet);
        self.condvar.notify_all();
    }

    /// Drain and return every packet handed to [`CaptureHandle::send`] so far.
    pub fn take_sent(&self) -> Vec<CapturedPacket> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut inner.sent)
    }
}

impl CaptureHandle for FakeCaptureHandle {
    fn recv(&self) -> Result<CapturedPacket, TransientCaptureError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(packet) = inner.inbox.pop_front() {
                return Ok(packet);
            }
            if inner.closed {
                return Err(TransientCaptureError::Closed);
            }
            inner = self.condvar.wait(inner).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn send(&self, packet: CapturedPacket) -> Result<(), TransientCaptureError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.sent.push(packet);
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.closed = true;
        self.condvar.notify_all();
    }
}
