//! Devices module
//!
//! Contains the 16550 UART

pub mod uart;

pub use uart::{Serial16550, SerialInbound, SerialStats};
