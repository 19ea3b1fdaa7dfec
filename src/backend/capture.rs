//! In-memory transport recording everything the guest sends.

use super::{LineParams, ModemLines, SerialBackend};
use crate::timer::VirtualClock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Captured {
    output: Vec<(Duration, u8)>,
    lines: Option<ModemLines>,
    dtr_rts: Option<(bool, bool)>,
    params: Option<LineParams>,
    breaks: Vec<bool>,
    detached: bool,
}

/// Records transmitted bytes with the virtual time they left the shift
/// register. Clones share the same recording, so a test can keep one clone
/// and hand the other to the port.
#[derive(Debug, Clone, Default)]
pub struct CaptureBackend {
    inner: Arc<Mutex<Captured>>,
    clock: Option<VirtualClock>,
}

impl CaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamps each byte with `clock`.
    pub fn with_clock(clock: VirtualClock) -> Self {
        CaptureBackend {
            inner: Default::default(),
            clock: Some(clock),
        }
    }

    /// Makes [`SerialBackend::modem_lines`] report `lines`, so the port polls.
    pub fn set_lines(&self, lines: Option<ModemLines>) {
        self.inner.lock().lines = lines;
    }

    /// Bytes sent so far.
    pub fn output(&self) -> Vec<u8> {
        self.inner.lock().output.iter().map(|&(_, b)| b).collect()
    }

    /// Bytes sent so far with their send times.
    pub fn timed_output(&self) -> Vec<(Duration, u8)> {
        self.inner.lock().output.clone()
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().output)
            .into_iter()
            .map(|(_, b)| b)
            .collect()
    }

    pub fn modem_control(&self) -> Option<(bool, bool)> {
        self.inner.lock().dtr_rts
    }

    pub fn line_params(&self) -> Option<LineParams> {
        self.inner.lock().params
    }

    /// Every break transition reported, in order.
    pub fn breaks(&self) -> Vec<bool> {
        self.inner.lock().breaks.clone()
    }

    pub fn is_detached(&self) -> bool {
        self.inner.lock().detached
    }
}

impl SerialBackend for CaptureBackend {
    fn send(&mut self, byte: u8) {
        let now = self.clock.as_ref().map_or(Duration::ZERO, |c| c.now());
        self.inner.lock().output.push((now, byte));
    }

    fn modem_lines(&mut self) -> Option<ModemLines> {
        self.inner.lock().lines
    }

    fn set_modem_control(&mut self, dtr: bool, rts: bool) {
        self.inner.lock().dtr_rts = Some((dtr, rts));
    }

    fn set_line_params(&mut self, params: &LineParams) {
        self.inner.lock().params = Some(*params);
    }

    fn set_break(&mut self, enabled: bool) {
        self.inner.lock().breaks.push(enabled);
    }

    fn detach(&mut self) {
        self.inner.lock().detached = true;
    }
}
