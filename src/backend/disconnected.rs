//! A transport with nothing attached.

use super::{ModemLines, SerialBackend};

/// Drops all output and reports every modem line low, like an unplugged
/// cable.
#[derive(Debug, Default)]
pub struct DisconnectedBackend;

impl SerialBackend for DisconnectedBackend {
    fn send(&mut self, _byte: u8) {}

    fn modem_lines(&mut self) -> Option<ModemLines> {
        Some(ModemLines::default())
    }

    fn pushes_modem_status(&self) -> bool {
        // Nothing ever changes.
        true
    }
}
