//! Transport adapters
//!
//! A [`SerialBackend`] is the host side of the wire: it receives the bytes the
//! guest transmits and reports modem input lines. Bytes flowing toward the
//! guest go through a [`SerialInbound`](crate::SerialInbound) handle instead,
//! which the transport may use from its own thread.

mod capture;
mod disconnected;
mod stream;

pub use capture::CaptureBackend;
pub use disconnected::DisconnectedBackend;
pub use stream::{spawn_reader, StreamBackend};

use serde::{Serialize, Deserialize};

/// State of the modem input lines driven by the far end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemLines {
    pub cts: bool,
    pub dsr: bool,
    pub ri: bool,
    pub dcd: bool,
}

impl ModemLines {
    /// Lines of a connected peer that is ready to talk.
    pub const CONNECTED: ModemLines = ModemLines {
        cts: true,
        dsr: true,
        ri: false,
        dcd: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Line settings programmed by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineParams {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub two_stop_bits: bool,
}

/// Host side of a serial port.
///
/// All methods are called on the port's owner thread and must not block.
pub trait SerialBackend: Send {
    /// Takes one byte shifted out by the guest. Implementations may buffer
    /// or drop it; the port does not retry.
    fn send(&mut self, byte: u8);

    /// Current modem input lines, or `None` if the transport cannot report
    /// them. The port treats `None` as a permanently connected peer.
    fn modem_lines(&mut self) -> Option<ModemLines> {
        None
    }

    /// Whether the transport pushes line changes through
    /// [`SerialInbound::set_modem_lines`](crate::SerialInbound::set_modem_lines).
    /// When false and [`modem_lines`](Self::modem_lines) reports lines, the
    /// port polls them while modem status interrupts are enabled.
    fn pushes_modem_status(&self) -> bool {
        false
    }

    /// DTR/RTS changed.
    fn set_modem_control(&mut self, _dtr: bool, _rts: bool) {}

    /// Baud rate or framing changed.
    fn set_line_params(&mut self, _params: &LineParams) {}

    /// The guest started or stopped sending a break.
    fn set_break(&mut self, _enabled: bool) {}

    /// The port is being torn down.
    fn detach(&mut self) {}
}

impl SerialBackend for Box<dyn SerialBackend> {
    fn send(&mut self, byte: u8) {
        (**self).send(byte)
    }

    fn modem_lines(&mut self) -> Option<ModemLines> {
        (**self).modem_lines()
    }

    fn pushes_modem_status(&self) -> bool {
        (**self).pushes_modem_status()
    }

    fn set_modem_control(&mut self, dtr: bool, rts: bool) {
        (**self).set_modem_control(dtr, rts)
    }

    fn set_line_params(&mut self, params: &LineParams) {
        (**self).set_line_params(params)
    }

    fn set_break(&mut self, enabled: bool) {
        (**self).set_break(enabled)
    }

    fn detach(&mut self) {
        (**self).detach()
    }
}
