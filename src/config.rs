//! Construction parameters for a serial port.

use crate::devices::uart::fifo::MAX_FIFO_DEPTH;
use serde::{Serialize, Deserialize};
use std::time::Duration;
use thiserror::Error;

/// Default baud base: a 1.8432 MHz crystal divided by 16.
pub const DEFAULT_BAUD_BASE: u32 = 115_200;
/// 16550 FIFO depth.
pub const DEFAULT_FIFO_DEPTH: usize = 16;
/// Characters the transport may queue ahead of the receive FIFO.
pub const DEFAULT_INBOUND_QUEUE_CHARS: usize = 4096;

/// Immutable parameters of one port instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Name used in log events.
    pub debug_name: String,
    /// Input clock divided by 16, in Hz. Divisor 1 runs at this baud rate.
    pub baud_base: u32,
    /// Capacity of each FIFO in FIFO mode.
    pub fifo_depth: usize,
    /// Idle character times before a partially filled receive FIFO times out.
    pub rx_timeout_chars: u32,
    /// Bound on characters queued by the transport while the receive FIFO is
    /// full. Non-blocking deliveries beyond it are lost as overruns.
    pub inbound_queue_chars: usize,
    /// Interval for polling modem lines from transports that don't push them.
    pub modem_poll_interval_ms: u64,
    /// Only drive the interrupt line while MCR OUT2 is set, as PC boards do.
    pub out2_gates_interrupt: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            debug_name: "serial".to_string(),
            baud_base: DEFAULT_BAUD_BASE,
            fifo_depth: DEFAULT_FIFO_DEPTH,
            rx_timeout_chars: 4,
            inbound_queue_chars: DEFAULT_INBOUND_QUEUE_CHARS,
            modem_poll_interval_ms: 10,
            out2_gates_interrupt: false,
        }
    }
}

/// An error returned by [`SerialConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("baud base must be non-zero")]
    ZeroBaudBase,
    #[error("invalid fifo depth: {0} (expected 1..=256)")]
    InvalidFifoDepth(usize),
    #[error("receive timeout must be at least one character time")]
    ZeroRxTimeout,
    #[error("modem poll interval must be non-zero")]
    ZeroModemPollInterval,
    #[error("inbound queue must hold at least one character")]
    ZeroInboundQueue,
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.baud_base == 0 {
            return Err(ConfigurationError::ZeroBaudBase);
        }
        if !(1..=MAX_FIFO_DEPTH).contains(&self.fifo_depth) {
            return Err(ConfigurationError::InvalidFifoDepth(self.fifo_depth));
        }
        if self.rx_timeout_chars == 0 {
            return Err(ConfigurationError::ZeroRxTimeout);
        }
        if self.modem_poll_interval_ms == 0 {
            return Err(ConfigurationError::ZeroModemPollInterval);
        }
        if self.inbound_queue_chars == 0 {
            return Err(ConfigurationError::ZeroInboundQueue);
        }
        Ok(())
    }

    pub fn modem_poll_interval(&self) -> Duration {
        Duration::from_millis(self.modem_poll_interval_ms)
    }

    /// Receive trigger levels selectable through FCR bits 6-7. For a 16-byte
    /// FIFO these are the 16550 values 1, 4, 8 and 14.
    pub fn trigger_levels(&self) -> [usize; 4] {
        let depth = self.fifo_depth.max(1);
        [1, depth / 4, depth / 2, depth.saturating_sub(2)].map(|level| level.clamp(1, depth))
    }
}
