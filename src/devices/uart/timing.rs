//! Line timing derived from the divisor latch and line control settings.

use super::regs::LineControlRegister;
use crate::backend::{LineParams, Parity};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Per-character timing of the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTiming {
    /// Frame length in half bit times (1.5 stop bits is representable).
    frame_half_bits: u32,
    /// Time to shift one full frame out (or in).
    char_time: Duration,
}

impl LineTiming {
    /// Computes the timing for `divisor` against a `baud_base` clock
    /// (crystal frequency / 16). A divisor of zero behaves like one.
    pub fn new(baud_base: u32, divisor: u16, lcr: LineControlRegister) -> Self {
        let frame_half_bits = frame_half_bits(lcr);
        let divisor = divisor.max(1) as u128;
        let nanos = frame_half_bits as u128 * divisor * NANOS_PER_SEC
            / (2 * baud_base.max(1) as u128);
        LineTiming {
            frame_half_bits,
            char_time: Duration::from_nanos(nanos.min(u64::MAX as u128) as u64),
        }
    }

    pub fn char_time(&self) -> Duration {
        self.char_time
    }

    /// Bits per frame, rounded up when the frame has 1.5 stop bits.
    pub fn frame_bits(&self) -> u32 {
        self.frame_half_bits.div_ceil(2)
    }

    /// Idle time after which a partially filled receive FIFO times out.
    pub fn rx_timeout(&self, chars: u32) -> Duration {
        self.char_time.saturating_mul(chars)
    }
}

fn data_bits(lcr: LineControlRegister) -> u32 {
    lcr.data_word_length() as u32 + 5
}

/// Start bit + data bits + optional parity bit + stop bits, in half bits.
fn frame_half_bits(lcr: LineControlRegister) -> u32 {
    let data = data_bits(lcr);
    let parity = lcr.parity_enable() as u32;
    let stop_half_bits = match (lcr.two_stop_bits(), data) {
        (false, _) => 2,
        (true, 5) => 3,
        (true, _) => 4,
    };
    2 * (1 + data + parity) + stop_half_bits
}

/// Line parameters as reported to the transport.
pub fn line_params(baud_base: u32, divisor: u16, lcr: LineControlRegister) -> LineParams {
    let parity = match (lcr.parity_enable(), lcr.stick_parity(), lcr.even_parity()) {
        (false, _, _) => Parity::None,
        (true, false, false) => Parity::Odd,
        (true, false, true) => Parity::Even,
        (true, true, false) => Parity::Mark,
        (true, true, true) => Parity::Space,
    };
    LineParams {
        baud_rate: baud_base / divisor.max(1) as u32,
        data_bits: data_bits(lcr) as u8,
        parity,
        two_stop_bits: lcr.two_stop_bits(),
    }
}
