//! Serial port snapshot
//!
//! Captures the full guest-visible state of a port, including FIFO ring
//! layouts and the hidden interrupt-pending flags, so a restored port behaves
//! exactly like the saved one. Derived values (line status, interrupt
//! identification, timing) are recomputed on restore.

use serde::{Serialize, Deserialize};
use std::time::Duration;
use thiserror::Error;

/// Ring buffer layout of one FIFO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoSnapshot {
    /// Raw storage, `capacity` bytes
    pub data: Vec<u8>,
    /// Per-slot LSR error bits
    pub tags: Vec<u8>,
    pub head: u32,
    pub tail: u32,
    pub count: u32,
}

/// Saved state of one serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSnapshot {
    /// Version for compatibility checking
    pub version: u32,
    /// Divisor latch
    pub divisor: u16,
    /// Last character read from the receiver
    pub rbr: u8,
    /// Last character written to the holding register
    pub thr: u8,
    /// Transmit shift register
    pub tsr: u8,
    /// Whether the shift register holds a character in flight
    pub tsr_full: bool,
    /// Interrupt enable register
    pub ier: u8,
    /// Line control register
    pub lcr: u8,
    /// Modem control register
    pub mcr: u8,
    /// Latched line status error bits
    pub lsr_errors: u8,
    /// Modem status register (physical lines and deltas)
    pub msr: u8,
    /// Scratch register
    pub scr: u8,
    /// FIFO control register, with the reset bits cleared
    pub fcr: u8,
    /// RX FIFO contents
    pub rx_fifo: FifoSnapshot,
    /// TX FIFO contents
    pub tx_fifo: FifoSnapshot,
    /// THR empty interrupt pending
    pub thr_ipending: bool,
    /// Character timeout interrupt pending
    pub timeout_ipending: bool,
    /// Break state at the last LCR write
    pub last_break_enable: bool,
    /// Time left on the transmit timer, if armed
    pub tx_timer_remaining: Option<Duration>,
    /// Time left on the receive timeout timer, if armed
    pub rx_timeout_remaining: Option<Duration>,
}

/// Saved state that cannot be applied to this port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestoreError {
    #[error("unsupported snapshot version {0}")]
    Version(u32),
    #[error("fifo capacity mismatch: saved {saved}, configured {configured}")]
    FifoCapacity { saved: usize, configured: usize },
    #[error("inconsistent {0} fifo layout")]
    FifoLayout(&'static str),
}

/// Snapshot encoding failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("serialization error")]
    Serialize(#[source] bincode::Error),
    #[error("deserialization error")]
    Deserialize(#[source] bincode::Error),
    #[error("compression error")]
    Compress(#[source] std::io::Error),
    #[error("decompression error")]
    Decompress(#[source] std::io::Error),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

impl SerialSnapshot {
    /// Current snapshot version
    pub const VERSION: u32 = 1;

    /// Serialize to bytes (compressed with zstd)
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let serialized = bincode::serialize(self).map_err(SnapshotError::Serialize)?;
        zstd::stream::encode_all(&serialized[..], 3).map_err(SnapshotError::Compress)
    }

    /// Deserialize from bytes (compressed with zstd)
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        let decompressed = zstd::stream::decode_all(data).map_err(SnapshotError::Decompress)?;
        let snapshot: SerialSnapshot =
            bincode::deserialize(&decompressed).map_err(SnapshotError::Deserialize)?;
        if snapshot.version != Self::VERSION {
            return Err(SnapshotError::Version(snapshot.version));
        }
        Ok(snapshot)
    }
}
