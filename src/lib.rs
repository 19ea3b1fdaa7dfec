//! 16450/16550 UART emulation core
//!
//! A serial port model for virtual machine monitors, reproducing the register
//! file, FIFOs, interrupt priorities and baud-rate pacing of the PC16550D so
//! that unmodified guest drivers work, from polling loops to FIFO trigger
//! level interrupt handlers.
//!
//! The port is driven by its owner through [`Serial16550::read8`],
//! [`Serial16550::write8`], [`Serial16550::on_timer`] and
//! [`Serial16550::process_inbound`]. Host-side collaborators plug in through
//! [`LineInterrupt`], [`SerialBackend`] and [`TimerService`].

pub mod backend;
pub mod config;
mod devices;
pub mod interrupt;
pub mod snapshot;
pub mod timer;

pub use backend::SerialBackend;
pub use config::{ConfigurationError, SerialConfig};
pub use devices::uart::regs;
pub use devices::{Serial16550, SerialInbound, SerialStats};
pub use interrupt::{LevelLine, LineInterrupt};
pub use snapshot::SerialSnapshot;
pub use timer::{TimerHandle, TimerService, VirtualClock};
