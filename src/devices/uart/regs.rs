//! Register layouts of the 16450/16550 programming interface.
//!
//! Field names follow the National Semiconductor PC16550D datasheet.

use bitfield_struct::bitfield;

// Register offsets within the 8-byte block
pub const UART_RBR: u32 = 0; // Receive Buffer Register (read, DLAB=0)
pub const UART_THR: u32 = 0; // Transmitter Holding Register (write, DLAB=0)
pub const UART_DLL: u32 = 0; // Divisor Latch LSB (DLAB=1)
pub const UART_IER: u32 = 1; // Interrupt Enable Register (DLAB=0)
pub const UART_DLM: u32 = 1; // Divisor Latch MSB (DLAB=1)
pub const UART_IIR: u32 = 2; // Interrupt Identification Register (read)
pub const UART_FCR: u32 = 2; // FIFO Control Register (write)
pub const UART_LCR: u32 = 3; // Line Control Register
pub const UART_MCR: u32 = 4; // Modem Control Register
pub const UART_LSR: u32 = 5; // Line Status Register
pub const UART_MSR: u32 = 6; // Modem Status Register
pub const UART_SCR: u32 = 7; // Scratch Register

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct InterruptEnableRegister {
    pub received_data_avail: bool,
    pub thr_empty: bool,
    pub receiver_line_status: bool,
    pub modem_status: bool,
    #[bits(4)]
    pub reserved: u8,
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct InterruptIdentificationRegister {
    pub no_interrupt_pending: bool,
    #[bits(3)]
    pub source: u8,
    #[bits(2)]
    pub reserved: u8,
    #[bits(2)]
    pub fifo_state: u8,
}

/// Value of the IIR FIFO state field while FIFOs are enabled.
pub const FIFO_STATE_ENABLED: u8 = 3;

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct FifoControlRegister {
    pub enable_fifos: bool,
    pub clear_rx_fifo: bool,
    pub clear_tx_fifo: bool,
    pub dma_mode: bool,
    #[bits(2)]
    pub reserved: u8,
    #[bits(2)]
    pub rx_fifo_int_trigger: u8,
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct LineControlRegister {
    #[bits(2)]
    pub data_word_length: u8,
    pub two_stop_bits: bool,
    pub parity_enable: bool,
    pub even_parity: bool,
    pub stick_parity: bool,
    pub break_enabled: bool,
    pub dlab: bool,
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ModemControlRegister {
    pub dtr: bool, // Data Terminal Ready
    pub rts: bool, // Request To Send
    pub out1: bool,
    pub out2: bool,
    pub loopback: bool,
    #[bits(3)]
    pub reserved: u8,
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct LineStatusRegister {
    pub data_ready: bool,
    pub overrun_error: bool,
    pub parity_error: bool,
    pub framing_error: bool,
    pub break_interrupt: bool,
    pub thr_empty: bool,
    pub thr_and_tsr_empty: bool,
    pub rx_fifo_error: bool,
}

/// LSR bits that are latched per received character and cleared by an LSR read.
pub const LSR_ERROR_MASK: u8 = 0x1e;
pub const LSR_OVERRUN: u8 = 0x02;
pub const LSR_PARITY: u8 = 0x04;
pub const LSR_FRAMING: u8 = 0x08;
pub const LSR_BREAK: u8 = 0x10;

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ModemStatusRegister {
    pub cts_change: bool,
    pub dsr_change: bool,
    pub ri_trailing_edge: bool,
    pub dcd_change: bool,
    pub cts: bool, // Clear To Send
    pub dsr: bool, // Data Set Ready
    pub ri: bool,  // Ring Indicator
    pub dcd: bool, // Data Carrier Detect
}

/// MSR delta bits, cleared by an MSR read.
pub const MSR_DELTA_MASK: u8 = 0x0f;

impl ModemStatusRegister {
    pub fn any_delta(&self) -> bool {
        u8::from(*self) & MSR_DELTA_MASK != 0
    }
}

/// Interrupt sources in the encoding of IIR bits 1-3.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSource {
    ModemStatus = 0,
    ThrEmpty = 1,
    ReceivedDataAvail = 2,
    ReceiverLineStatus = 3,
    ReceiveTimeout = 6,
}
