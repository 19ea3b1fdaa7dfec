use super::fifo::SerialFifo;
use super::regs::*;
use super::{Serial16550, State, TimerSlot};
use crate::snapshot::{FifoSnapshot, RestoreError, SerialSnapshot};
use std::time::Duration;

fn save_fifo(fifo: &SerialFifo) -> FifoSnapshot {
    let (data, tags, head, tail, count) = fifo.raw_parts();
    FifoSnapshot {
        data: data.to_vec(),
        tags: tags.to_vec(),
        head: head as u32,
        tail: tail as u32,
        count: count as u32,
    }
}

fn restore_fifo(
    saved: &FifoSnapshot,
    capacity: usize,
    name: &'static str,
) -> Result<SerialFifo, RestoreError> {
    if saved.data.len() != capacity {
        return Err(RestoreError::FifoCapacity {
            saved: saved.data.len(),
            configured: capacity,
        });
    }
    // Depth and trigger level are re-derived from FCR by the caller.
    SerialFifo::from_raw_parts(
        &saved.data,
        &saved.tags,
        saved.head as usize,
        saved.tail as usize,
        saved.count as usize,
        capacity,
        1,
    )
    .ok_or(RestoreError::FifoLayout(name))
}

impl Serial16550 {
    fn remaining(&self, slot: TimerSlot) -> Option<Duration> {
        let now = self.timers.now();
        self.armed[slot as usize].map(|t| t.deadline.saturating_sub(now))
    }

    /// Captures the port state.
    pub fn save(&self) -> SerialSnapshot {
        let State {
            divisor,
            rbr,
            thr,
            tsr,
            tsr_full,
            ier,
            lcr,
            mcr,
            lsr_errors,
            msr,
            scratch,
            fcr,
            rx_fifo,
            tx_fifo,
            thr_ipending,
            timeout_ipending,
            last_break_enable,
        } = &self.state;
        SerialSnapshot {
            version: SerialSnapshot::VERSION,
            divisor: *divisor,
            rbr: *rbr,
            thr: *thr,
            tsr: *tsr,
            tsr_full: *tsr_full,
            ier: (*ier).into(),
            lcr: (*lcr).into(),
            mcr: (*mcr).into(),
            lsr_errors: *lsr_errors,
            msr: (*msr).into(),
            scr: *scratch,
            fcr: (*fcr).into(),
            rx_fifo: save_fifo(rx_fifo),
            tx_fifo: save_fifo(tx_fifo),
            thr_ipending: *thr_ipending,
            timeout_ipending: *timeout_ipending,
            last_break_enable: *last_break_enable,
            tx_timer_remaining: self.remaining(TimerSlot::Transmit),
            rx_timeout_remaining: self.remaining(TimerSlot::RxTimeout),
        }
    }

    /// Replaces the port state with `saved`. Timers are re-armed with their
    /// remaining time and the interrupt line is driven to match. On error the
    /// port is left unchanged.
    pub fn restore(&mut self, saved: &SerialSnapshot) -> Result<(), RestoreError> {
        if saved.version != SerialSnapshot::VERSION {
            return Err(RestoreError::Version(saved.version));
        }
        let capacity = self.config.fifo_depth;
        let rx_fifo = restore_fifo(&saved.rx_fifo, capacity, "rx")?;
        let tx_fifo = restore_fifo(&saved.tx_fifo, capacity, "tx")?;

        for slot in TimerSlot::ALL {
            self.disarm(slot);
        }
        self.state = State {
            divisor: saved.divisor,
            rbr: saved.rbr,
            thr: saved.thr,
            tsr: saved.tsr,
            tsr_full: saved.tsr_full,
            ier: InterruptEnableRegister::from(saved.ier).with_reserved(0),
            lcr: saved.lcr.into(),
            mcr: ModemControlRegister::from(saved.mcr).with_reserved(0),
            lsr_errors: saved.lsr_errors & LSR_ERROR_MASK,
            msr: saved.msr.into(),
            scratch: saved.scr,
            fcr: FifoControlRegister::from(saved.fcr)
                .with_reserved(0)
                .with_clear_rx_fifo(false)
                .with_clear_tx_fifo(false),
            rx_fifo,
            tx_fifo,
            thr_ipending: saved.thr_ipending,
            timeout_ipending: saved.timeout_ipending,
            last_break_enable: saved.last_break_enable,
        };
        self.apply_fifo_mode();
        self.update_timing();

        if self.state.tsr_full {
            // A character in flight needs its timer to finish shifting.
            let delay = saved.tx_timer_remaining.unwrap_or_else(|| self.timing.char_time());
            self.arm(TimerSlot::Transmit, delay);
        }
        if let Some(delay) = saved.rx_timeout_remaining {
            self.arm(TimerSlot::RxTimeout, delay);
        } else {
            self.sync_rx_timeout(false);
        }
        self.update_modem_poll();
        self.update_irq();
        Ok(())
    }
}
