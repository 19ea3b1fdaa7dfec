//! Interrupt priority resolution.
//!
//! Stateless: the port snapshots its pending conditions into [`Conditions`]
//! after every event and asks for the highest-priority active source.

use super::regs::{
    InterruptEnableRegister, InterruptIdentificationRegister, InterruptSource, FIFO_STATE_ENABLED,
};

/// Pending interrupt conditions, before masking by IER.
#[derive(Debug, Clone, Copy)]
pub struct Conditions {
    pub ier: InterruptEnableRegister,
    /// Any of overrun, parity, framing or break latched in LSR.
    pub line_error: bool,
    pub rx_count: usize,
    pub rx_trigger: usize,
    pub timeout_pending: bool,
    pub thr_pending: bool,
    pub msr_delta: bool,
}

/// Returns the highest-priority enabled source, in 16550 order: receiver
/// line status, received data (or character timeout), THR empty, modem status.
pub fn resolve(c: &Conditions) -> Option<InterruptSource> {
    if c.ier.receiver_line_status() && c.line_error {
        return Some(InterruptSource::ReceiverLineStatus);
    }
    if c.ier.received_data_avail() {
        if c.rx_count > 0 && c.rx_count >= c.rx_trigger {
            return Some(InterruptSource::ReceivedDataAvail);
        }
        if c.timeout_pending {
            return Some(InterruptSource::ReceiveTimeout);
        }
    }
    if c.ier.thr_empty() && c.thr_pending {
        return Some(InterruptSource::ThrEmpty);
    }
    if c.ier.modem_status() && c.msr_delta {
        return Some(InterruptSource::ModemStatus);
    }
    None
}

/// Encodes the IIR value for `source`.
pub fn identification(source: Option<InterruptSource>, fifo_enabled: bool) -> u8 {
    InterruptIdentificationRegister::new()
        .with_no_interrupt_pending(source.is_none())
        .with_source(source.map_or(0, |s| s as u8))
        .with_fifo_state(if fifo_enabled { FIFO_STATE_ENABLED } else { 0 })
        .into()
}
