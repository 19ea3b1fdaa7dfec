//! UART 16450/16550 compatible device
//!
//! Emulates the register file, FIFOs, interrupt logic and line timing of a
//! PC16550D. Guest accesses, timer expiries and transport events all run on
//! the port's owner thread; the transport's own I/O context only talks to a
//! [`SerialInbound`] handle.

pub(crate) mod arbiter;
pub(crate) mod fifo;
pub(crate) mod inbound;
pub mod regs;
mod save_restore;
pub(crate) mod timing;

use self::arbiter::Conditions;
use self::fifo::{Overrun, SerialFifo};
use self::inbound::{InboundEvent, Inbox};
use self::regs::*;
use self::timing::LineTiming;
use crate::backend::{DisconnectedBackend, LineParams, ModemLines, SerialBackend};
use crate::config::{ConfigurationError, SerialConfig};
use crate::interrupt::LineInterrupt;
use crate::timer::{TimerHandle, TimerService};
use std::sync::Arc;
use std::task::Context;
use std::time::Duration;

pub use self::inbound::SerialInbound;

/// Power-on divisor: 9600 baud from a 115200 baud base.
pub const DEFAULT_DIVISOR: u16 = 12;

/// The three timers a port may have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerSlot {
    Transmit = 0,
    RxTimeout = 1,
    ModemPoll = 2,
}

impl TimerSlot {
    const ALL: [TimerSlot; 3] = [TimerSlot::Transmit, TimerSlot::RxTimeout, TimerSlot::ModemPoll];
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    handle: TimerHandle,
    deadline: Duration,
}

/// Traffic counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SerialStats {
    /// Characters accepted into the receive FIFO.
    pub rx_bytes: u64,
    /// Characters shifted out of the transmitter.
    pub tx_bytes: u64,
    /// Received characters lost to overrun or discarded in loopback mode.
    pub rx_dropped: u64,
    /// Transmit holding writes lost to a full FIFO or overwritten.
    pub tx_dropped: u64,
}

/// Guest-visible device state.
#[derive(Debug, Clone, PartialEq, Eq)]
struct State {
    divisor: u16,
    /// Last character read from the receiver.
    rbr: u8,
    /// Last character written to the holding register.
    thr: u8,
    /// Character being shifted out.
    tsr: u8,
    tsr_full: bool,
    ier: InterruptEnableRegister,
    lcr: LineControlRegister,
    mcr: ModemControlRegister,
    /// Latched overrun bit, plus the parity/framing/break bits of the
    /// characters that have reached the head of the receive FIFO.
    lsr_errors: u8,
    /// Physical modem input lines plus delta bits.
    msr: ModemStatusRegister,
    scratch: u8,
    fcr: FifoControlRegister,
    rx_fifo: SerialFifo,
    tx_fifo: SerialFifo,
    /// THR empty interrupt pending. Survives IIR reads that report a higher
    /// priority source.
    thr_ipending: bool,
    /// Character timeout interrupt pending.
    timeout_ipending: bool,
    last_break_enable: bool,
}

impl State {
    fn new(fifo_capacity: usize) -> Self {
        let mut rx_fifo = SerialFifo::new(fifo_capacity);
        let mut tx_fifo = SerialFifo::new(fifo_capacity);
        rx_fifo.set_depth(1);
        tx_fifo.set_depth(1);
        State {
            divisor: DEFAULT_DIVISOR,
            rbr: 0,
            thr: 0,
            tsr: 0,
            tsr_full: false,
            ier: InterruptEnableRegister::new(),
            lcr: LineControlRegister::new(),
            mcr: ModemControlRegister::new(),
            lsr_errors: 0,
            msr: ModemStatusRegister::new(),
            scratch: 0,
            fcr: FifoControlRegister::new(),
            rx_fifo,
            tx_fifo,
            thr_ipending: false,
            timeout_ipending: false,
            last_break_enable: false,
        }
    }

    fn set_lines(&mut self, lines: ModemLines) {
        self.msr = self
            .msr
            .with_cts(lines.cts)
            .with_dsr(lines.dsr)
            .with_ri(lines.ri)
            .with_dcd(lines.dcd);
    }

    /// The MSR as the guest sees it.
    fn effective_msr(&self) -> ModemStatusRegister {
        if self.mcr.loopback() {
            // Outputs are wired back to the inputs.
            self.msr
                .with_cts(self.mcr.rts())
                .with_dsr(self.mcr.dtr())
                .with_ri(self.mcr.out1())
                .with_dcd(self.mcr.out2())
        } else {
            self.msr
        }
    }

    /// Call `f`, which updates the effective MSR, then update MSR change bits.
    fn update_msr(&mut self, f: impl FnOnce(&mut Self)) {
        let old_msr = self.effective_msr();
        f(self);
        let new_msr = self.effective_msr();
        if old_msr.cts() != new_msr.cts() {
            self.msr.set_cts_change(true);
        }
        if old_msr.dsr() != new_msr.dsr() {
            self.msr.set_dsr_change(true);
        }
        if old_msr.ri() && !new_msr.ri() {
            self.msr.set_ri_trailing_edge(true);
        }
        if old_msr.dcd() != new_msr.dcd() {
            self.msr.set_dcd_change(true);
        }
    }

    fn line_status(&self) -> LineStatusRegister {
        let thr_empty = self.tx_fifo.is_empty();
        LineStatusRegister::from(self.lsr_errors & LSR_ERROR_MASK)
            .with_data_ready(!self.rx_fifo.is_empty())
            .with_thr_empty(thr_empty)
            .with_thr_and_tsr_empty(thr_empty && !self.tsr_full)
            .with_rx_fifo_error(self.fcr.enable_fifos() && self.rx_fifo.has_tagged())
    }

    fn conditions(&self) -> Conditions {
        Conditions {
            ier: self.ier,
            line_error: self.lsr_errors & LSR_ERROR_MASK != 0,
            rx_count: self.rx_fifo.len(),
            rx_trigger: self.rx_fifo.trigger_level(),
            timeout_pending: self.timeout_ipending,
            thr_pending: self.thr_ipending,
            msr_delta: self.effective_msr().any_delta(),
        }
    }
}

/// A 16550 serial port.
pub struct Serial16550 {
    // Fixed configuration
    config: SerialConfig,
    trigger_levels: [usize; 4],
    poll_modem_lines: bool,

    // Runtime glue
    interrupt: Box<dyn LineInterrupt>,
    backend: Box<dyn SerialBackend>,
    timers: Box<dyn TimerService>,
    inbox: Arc<Inbox>,

    // Volatile state
    state: State,
    timing: LineTiming,
    line_params: LineParams,
    armed: [Option<ArmedTimer>; 3],
    irq_level: bool,
    detached: bool,
    stats: SerialStats,
}

impl Serial16550 {
    /// Creates a port in its power-on state.
    ///
    /// `interrupt`, `backend` and `timers` are handles to collaborators that
    /// outlive the port; they are never replaced.
    pub fn new(
        config: SerialConfig,
        interrupt: Box<dyn LineInterrupt>,
        mut backend: Box<dyn SerialBackend>,
        timers: Box<dyn TimerService>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let poll_modem_lines = !backend.pushes_modem_status() && backend.modem_lines().is_some();
        let state = State::new(config.fifo_depth);
        let timing = LineTiming::new(config.baud_base, state.divisor, state.lcr);
        let line_params = timing::line_params(config.baud_base, state.divisor, state.lcr);
        let inbox = Arc::new(Inbox::new(config.inbound_queue_chars));
        let mut this = Serial16550 {
            trigger_levels: config.trigger_levels(),
            config,
            poll_modem_lines,
            interrupt,
            backend,
            timers,
            inbox,
            state,
            timing,
            line_params,
            armed: [None; 3],
            irq_level: false,
            detached: false,
            stats: SerialStats::default(),
        };
        this.reset();
        Ok(this)
    }

    /// Returns a handle the transport uses to deliver input.
    pub fn inbound(&self) -> SerialInbound {
        SerialInbound {
            inbox: self.inbox.clone(),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn stats(&self) -> SerialStats {
        self.stats
    }

    /// Current level of the interrupt output.
    pub fn interrupt_asserted(&self) -> bool {
        self.irq_level
    }

    /// Duration of one character at the current line settings.
    pub fn char_time(&self) -> Duration {
        self.timing.char_time()
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.state.rx_fifo.len()
    }

    pub fn tx_fifo_len(&self) -> usize {
        self.state.tx_fifo.len()
    }

    /// Restores power-on defaults: divisor 12, all registers cleared, FIFOs
    /// empty, timers disarmed and the interrupt line low.
    pub fn reset(&mut self) {
        for slot in TimerSlot::ALL {
            self.disarm(slot);
        }
        self.state = State::new(self.config.fifo_depth);
        let lines = self.backend.modem_lines().unwrap_or(ModemLines::CONNECTED);
        self.state.set_lines(lines);
        self.update_timing();
        self.irq_level = false;
        self.update_irq();
    }

    /// Handles a guest register read at `offset` (0-7).
    pub fn read8(&mut self, offset: u32) -> u8 {
        debug_assert!(offset < 8, "bus decode passed offset {offset}");
        let dlab = self.state.lcr.dlab();
        let value = match offset & 7 {
            UART_DLL if dlab => self.state.divisor as u8,
            UART_RBR => self.read_rbr(),
            UART_DLM if dlab => (self.state.divisor >> 8) as u8,
            UART_IER => self.state.ier.into(),
            UART_IIR => self.read_iir(),
            UART_LCR => self.state.lcr.into(),
            UART_MCR => self.state.mcr.into(),
            UART_LSR => self.read_lsr(),
            UART_MSR => self.read_msr(),
            UART_SCR => self.state.scratch,
            _ => 0,
        };
        self.update_irq();
        value
    }

    /// Handles a guest register write at `offset` (0-7).
    pub fn write8(&mut self, offset: u32, value: u8) {
        debug_assert!(offset < 8, "bus decode passed offset {offset}");
        let dlab = self.state.lcr.dlab();
        match offset & 7 {
            UART_DLL if dlab => self.write_divisor((self.state.divisor & 0xff00) | value as u16),
            UART_THR => self.write_thr(value),
            UART_DLM if dlab => {
                self.write_divisor((self.state.divisor & 0x00ff) | ((value as u16) << 8))
            }
            UART_IER => self.write_ier(value),
            UART_FCR => self.write_fcr(value),
            UART_LCR => self.write_lcr(value),
            UART_MCR => self.write_mcr(value),
            UART_LSR | UART_MSR => {}
            UART_SCR => self.state.scratch = value,
            _ => {}
        }
        self.update_irq();
    }

    /// Handles expiry of a timer armed by this port. Stale handles, from
    /// timers cancelled by a reset or re-arm, are ignored.
    pub fn on_timer(&mut self, handle: TimerHandle) {
        let Some(slot) = TimerSlot::ALL
            .into_iter()
            .find(|&slot| self.armed[slot as usize].is_some_and(|t| t.handle == handle))
        else {
            tracing::trace!(port = self.config.debug_name, ?handle, "stale timer");
            return;
        };
        self.armed[slot as usize] = None;
        match slot {
            TimerSlot::Transmit => self.transmit_done(),
            TimerSlot::RxTimeout => {
                if !self.state.rx_fifo.is_empty() {
                    self.state.timeout_ipending = true;
                }
            }
            TimerSlot::ModemPoll => self.update_modem_poll(),
        }
        self.update_irq();
    }

    /// Applies what the transport queued since the last call, as far as the
    /// receive FIFO has room. Characters that don't fit stay queued until the
    /// guest reads some.
    pub fn process_inbound(&mut self) {
        let loopback = self.state.mcr.loopback();
        let fifo = &self.state.rx_fifo;
        let mut room = fifo.depth().saturating_sub(fifo.len());
        let (events, dropped) = self.inbox.take_while(|event| {
            // Loopback discards transport input, so it never waits for room.
            if loopback || !event.is_char() {
                return true;
            }
            if room == 0 {
                return false;
            }
            room -= 1;
            true
        });
        if dropped > 0 {
            tracing::debug!(
                port = self.config.debug_name,
                dropped,
                "inbound queue full, dropped input data"
            );
            self.state.lsr_errors |= LSR_OVERRUN;
            self.stats.rx_dropped += dropped;
        } else if events.is_empty() {
            return;
        }
        for event in events {
            match event {
                InboundEvent::Byte(byte) => {
                    if self.state.mcr.loopback() {
                        self.stats.rx_dropped += 1;
                    } else {
                        tracing::trace!(port = self.config.debug_name, byte, "rx");
                        self.receive_char(byte, 0);
                    }
                }
                InboundEvent::Break => {
                    if !self.state.mcr.loopback() {
                        tracing::debug!(port = self.config.debug_name, "break received");
                        self.receive_char(0, LSR_BREAK);
                    }
                }
                InboundEvent::ModemLines(lines) => {
                    if lines.dcd != self.state.msr.dcd() {
                        tracing::info!(
                            port = self.config.debug_name,
                            connected = lines.dcd,
                            "carrier change"
                        );
                    }
                    self.state.update_msr(|state| state.set_lines(lines));
                }
            }
        }
        self.update_irq();
    }

    /// Registers for a wakeup when the transport queues input, then applies
    /// any that is already queued.
    pub fn poll_device(&mut self, cx: &mut Context<'_>) {
        self.inbox.register(cx.waker());
        self.process_inbound();
    }

    /// Disarms all timers, detaches from the transport and returns it. Queued
    /// and future input from the transport is discarded.
    pub fn detach(mut self) -> Box<dyn SerialBackend> {
        self.shutdown();
        std::mem::replace(&mut self.backend, Box::new(DisconnectedBackend))
    }

    fn shutdown(&mut self) {
        if self.detached {
            return;
        }
        for slot in TimerSlot::ALL {
            self.disarm(slot);
        }
        self.inbox.detach();
        self.backend.detach();
        self.interrupt.set_level(false);
        self.irq_level = false;
        self.detached = true;
        tracing::info!(port = self.config.debug_name, "serial port detached");
    }

    fn pending_interrupt(&self) -> Option<InterruptSource> {
        arbiter::resolve(&self.state.conditions())
    }

    /// Drives the interrupt line from the current conditions.
    fn update_irq(&mut self) {
        let source = self.pending_interrupt();
        let level =
            source.is_some() && (!self.config.out2_gates_interrupt || self.state.mcr.out2());
        if level != self.irq_level {
            tracing::trace!(port = self.config.debug_name, level, ?source, "interrupt");
            self.irq_level = level;
        }
        self.interrupt.set_level(level);
    }

    fn arm(&mut self, slot: TimerSlot, delay: Duration) {
        self.disarm(slot);
        let deadline = self.timers.now() + delay;
        let handle = self.timers.arm(delay);
        self.armed[slot as usize] = Some(ArmedTimer { handle, deadline });
    }

    fn disarm(&mut self, slot: TimerSlot) {
        if let Some(timer) = self.armed[slot as usize].take() {
            self.timers.cancel(timer.handle);
        }
    }

    fn update_timing(&mut self) {
        let (baud_base, divisor, lcr) = (self.config.baud_base, self.state.divisor, self.state.lcr);
        self.timing = LineTiming::new(baud_base, divisor, lcr);
        let params = timing::line_params(baud_base, divisor, lcr);
        if params != self.line_params {
            tracing::debug!(
                port = self.config.debug_name,
                ?params,
                frame_bits = self.timing.frame_bits(),
                "line parameters"
            );
            self.line_params = params;
            self.backend.set_line_params(&params);
        }
    }

    /// Resizes the FIFOs and picks the trigger level for the current FCR.
    fn apply_fifo_mode(&mut self) {
        let (depth, trigger) = if self.state.fcr.enable_fifos() {
            (
                self.config.fifo_depth,
                self.trigger_levels[self.state.fcr.rx_fifo_int_trigger() as usize],
            )
        } else {
            (1, 1)
        };
        self.state.rx_fifo.set_depth(depth);
        self.state.rx_fifo.set_trigger_level(trigger);
        self.state.tx_fifo.set_depth(depth);
    }

    /// Keeps the character timeout armed while the receive FIFO holds data
    /// below its trigger level. `restart` restarts an armed timer, for FIFO
    /// activity that resets the idle gap.
    fn sync_rx_timeout(&mut self, restart: bool) {
        let fifo = &self.state.rx_fifo;
        let wanted =
            self.state.fcr.enable_fifos() && !fifo.is_empty() && fifo.len() < fifo.trigger_level();
        if !wanted {
            self.disarm(TimerSlot::RxTimeout);
        } else if restart || self.armed[TimerSlot::RxTimeout as usize].is_none() {
            let timeout = self.timing.rx_timeout(self.config.rx_timeout_chars);
            self.arm(TimerSlot::RxTimeout, timeout);
        }
    }

    /// Puts a received character into the receive FIFO, tagged with its
    /// parity/framing/break `errors`.
    fn receive_char(&mut self, byte: u8, errors: u8) {
        let was_empty = self.state.rx_fifo.is_empty();
        match self.state.rx_fifo.push(byte, errors) {
            Ok(()) => {
                self.stats.rx_bytes += 1;
                if was_empty {
                    self.latch_head_errors();
                }
            }
            Err(Overrun) => {
                tracing::debug!(port = self.config.debug_name, "rx fifo overrun, dropping input data");
                self.state.lsr_errors |= LSR_OVERRUN;
                self.stats.rx_dropped += 1;
            }
        }
        self.sync_rx_timeout(true);
    }

    /// LSR reports a character's error bits while it sits at the head of the
    /// receive FIFO, so they belong to the next RBR read.
    fn latch_head_errors(&mut self) {
        if let Some((_, tag)) = self.state.rx_fifo.peek() {
            self.state.lsr_errors |= tag & LSR_ERROR_MASK;
        }
    }

    /// Moves the oldest pending character into the shift register and puts
    /// it on the line.
    fn shift_next(&mut self) {
        let Some((byte, _)) = self.state.tx_fifo.pop() else {
            return;
        };
        self.state.tsr = byte;
        self.state.tsr_full = true;
        self.stats.tx_bytes += 1;
        if self.state.mcr.loopback() {
            self.receive_char(byte, 0);
        } else {
            tracing::trace!(port = self.config.debug_name, byte, "tx");
            self.backend.send(byte);
        }
        let char_time = self.timing.char_time();
        self.arm(TimerSlot::Transmit, char_time);
    }

    fn transmit_done(&mut self) {
        self.state.tsr_full = false;
        if self.state.tx_fifo.is_empty() {
            self.state.thr_ipending = true;
        } else {
            self.shift_next();
        }
    }

    /// Polls the transport's modem lines while modem status interrupts are
    /// enabled, outside loopback.
    fn update_modem_poll(&mut self) {
        if self.poll_modem_lines && self.state.ier.modem_status() && !self.state.mcr.loopback() {
            self.refresh_modem_lines();
            if self.armed[TimerSlot::ModemPoll as usize].is_none() {
                let interval = self.config.modem_poll_interval();
                self.arm(TimerSlot::ModemPoll, interval);
            }
        } else {
            self.disarm(TimerSlot::ModemPoll);
        }
    }

    fn refresh_modem_lines(&mut self) {
        if let Some(lines) = self.backend.modem_lines() {
            self.state.update_msr(|state| state.set_lines(lines));
        }
    }

    fn read_rbr(&mut self) -> u8 {
        if let Some((byte, _)) = self.state.rx_fifo.pop() {
            self.state.rbr = byte;
            self.state.timeout_ipending = false;
            self.latch_head_errors();
            self.sync_rx_timeout(true);
            // Space freed; pull in input the transport queued meanwhile.
            self.process_inbound();
        }
        self.state.rbr
    }

    fn read_iir(&mut self) -> u8 {
        let source = self.pending_interrupt();
        if source == Some(InterruptSource::ThrEmpty) {
            self.state.thr_ipending = false;
        }
        arbiter::identification(source, self.state.fcr.enable_fifos())
    }

    fn read_lsr(&mut self) -> u8 {
        let lsr = self.state.line_status();
        self.state.lsr_errors = 0;
        lsr.into()
    }

    fn read_msr(&mut self) -> u8 {
        if self.poll_modem_lines && !self.state.mcr.loopback() {
            self.refresh_modem_lines();
        }
        let msr = self.state.effective_msr();
        self.state.msr = ModemStatusRegister::from(u8::from(self.state.msr) & !MSR_DELTA_MASK);
        msr.into()
    }

    fn write_divisor(&mut self, divisor: u16) {
        self.state.divisor = divisor;
        self.update_timing();
    }

    fn write_thr(&mut self, data: u8) {
        self.state.thr = data;
        self.state.thr_ipending = false;
        if !self.state.tx_fifo.is_full() {
            // Cannot fail, the FIFO has room.
            let _ = self.state.tx_fifo.push(data, 0);
        } else if self.state.fcr.enable_fifos() {
            // Real hardware drops the newest byte, not the oldest one.
            tracing::debug!(port = self.config.debug_name, "tx fifo overrun, dropping output data");
            self.stats.tx_dropped += 1;
        } else {
            self.state.tx_fifo.overwrite_newest(data, 0);
            self.stats.tx_dropped += 1;
        }
        if !self.state.tsr_full {
            self.shift_next();
        }
    }

    fn write_ier(&mut self, data: u8) {
        let old = self.state.ier;
        let ier = InterruptEnableRegister::from(data).with_reserved(0);
        self.state.ier = ier;
        if ier.thr_empty() != old.thr_empty() {
            self.state.thr_ipending = ier.thr_empty() && self.state.tx_fifo.is_empty();
        }
        if ier.modem_status() != old.modem_status() {
            self.update_modem_poll();
        }
    }

    fn write_fcr(&mut self, data: u8) {
        let fcr = FifoControlRegister::from(data).with_reserved(0);
        if fcr.clear_rx_fifo() {
            tracing::debug!(port = self.config.debug_name, "clearing rx fifo");
            self.state.rx_fifo.clear();
            self.state.timeout_ipending = false;
        }
        if fcr.clear_tx_fifo() {
            tracing::debug!(port = self.config.debug_name, "clearing tx fifo");
            self.state.tx_fifo.clear();
        }
        if fcr.enable_fifos() != self.state.fcr.enable_fifos() {
            tracing::debug!(port = self.config.debug_name, enabled = fcr.enable_fifos(), "fifo mode");
        }
        self.state.fcr = fcr.with_clear_rx_fifo(false).with_clear_tx_fifo(false);
        self.apply_fifo_mode();
        if !self.state.fcr.enable_fifos() {
            self.state.timeout_ipending = false;
        }
        self.sync_rx_timeout(false);
        self.process_inbound();
    }

    fn write_lcr(&mut self, data: u8) {
        let lcr = LineControlRegister::from(data);
        self.state.lcr = lcr;
        self.update_timing();
        let break_enable = lcr.break_enabled();
        if break_enable != self.state.last_break_enable {
            self.state.last_break_enable = break_enable;
            tracing::debug!(port = self.config.debug_name, break_enable, "break");
            if self.state.mcr.loopback() {
                if break_enable {
                    self.receive_char(0, LSR_BREAK);
                }
            } else {
                self.backend.set_break(break_enable);
            }
        }
    }

    fn write_mcr(&mut self, data: u8) {
        let old = self.state.mcr;
        let mcr = ModemControlRegister::from(data).with_reserved(0);
        tracing::debug!(port = self.config.debug_name, ?mcr, "mcr update");
        // mcr.loopback may have changed, which could cause an MSR update.
        self.state.update_msr(|state| state.mcr = mcr);
        if !mcr.loopback() && (old.loopback() || old.dtr() != mcr.dtr() || old.rts() != mcr.rts())
        {
            self.backend.set_modem_control(mcr.dtr(), mcr.rts());
        }
        if old.loopback() != mcr.loopback() {
            self.update_modem_poll();
            self.process_inbound();
        }
    }
}

impl Drop for Serial16550 {
    fn drop(&mut self) {
        self.shutdown();
    }
}
