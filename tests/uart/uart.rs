use std::time::Duration;
use uart16550::backend::{CaptureBackend, ModemLines};
use uart16550::regs::*;
use uart16550::{LevelLine, Serial16550, SerialConfig, SerialSnapshot, VirtualClock};

struct Harness {
    serial: Serial16550,
    clock: VirtualClock,
    line: LevelLine,
    backend: CaptureBackend,
}

impl Harness {
    fn new() -> Self {
        Self::with_backend(SerialConfig::default(), |b| b)
    }

    fn with_backend(config: SerialConfig, f: impl FnOnce(CaptureBackend) -> CaptureBackend) -> Self {
        let clock = VirtualClock::new();
        let line = LevelLine::new();
        let backend = f(CaptureBackend::with_clock(clock.clone()));
        let serial = Serial16550::new(
            config,
            Box::new(line.clone()),
            Box::new(backend.clone()),
            Box::new(clock.clone()),
        )
        .unwrap();
        Harness {
            serial,
            clock,
            line,
            backend,
        }
    }

    fn set_divisor(&mut self, divisor: u16) {
        let lcr = self.serial.read8(UART_LCR);
        self.serial.write8(UART_LCR, lcr | 0x80);
        self.serial.write8(UART_DLL, divisor as u8);
        self.serial.write8(UART_DLM, (divisor >> 8) as u8);
        self.serial.write8(UART_LCR, lcr);
    }

    fn receive(&mut self, bytes: &[u8]) {
        self.serial.inbound().deliver(bytes);
        self.serial.process_inbound();
    }

    fn advance(&mut self, by: Duration) {
        let serial = &mut self.serial;
        self.clock.advance(by, |h| serial.on_timer(h));
    }

    fn drain_rx(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while self.serial.read8(UART_LSR) & 0x01 != 0 {
            out.push(self.serial.read8(UART_RBR));
        }
        out
    }
}

const LCR_8N1: u8 = 0x03;

#[test]
fn test_fifo_enable_toggle_keeps_contents() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    h.receive(b"abc");
    h.serial.write8(UART_FCR, 0x00);
    h.serial.write8(UART_FCR, 0x01);
    h.serial.write8(UART_FCR, 0x00);
    assert_eq!(h.serial.rx_fifo_len(), 3);

    h.serial.write8(UART_FCR, 0x01 | 0x02);
    assert_eq!(h.serial.rx_fifo_len(), 0);
    // The reset bits self-clear; writing plain enable again leaves data alone.
    h.receive(b"d");
    h.serial.write8(UART_FCR, 0x01);
    assert_eq!(h.drain_rx(), b"d");
}

#[test]
fn test_tx_fifo_reset() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    h.serial.write8(UART_THR, b'1');
    h.serial.write8(UART_THR, b'2');
    h.serial.write8(UART_THR, b'3');
    assert_eq!(h.serial.tx_fifo_len(), 2);
    h.serial.write8(UART_FCR, 0x01 | 0x04);
    assert_eq!(h.serial.tx_fifo_len(), 0);
    // The character already in the shift register still goes out.
    h.advance(Duration::from_secs(1));
    assert_eq!(h.backend.output(), b"1");
}

#[test]
fn test_overrun_drops_newest() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    h.serial.write8(UART_MCR, 0x10);
    // One byte in the shifter and sixteen queued behind it.
    for b in 0..17u8 {
        h.serial.write8(UART_THR, b);
    }
    let char_time = h.serial.char_time();
    h.advance(char_time * 17);
    assert_eq!(h.serial.rx_fifo_len(), 16);
    assert_eq!(h.serial.read8(UART_LSR) & 0x02, 0x02);
    // Reading LSR cleared the overrun bit.
    assert_eq!(h.serial.read8(UART_LSR) & 0x02, 0);
    assert_eq!(h.drain_rx(), (0..16).collect::<Vec<u8>>());
    assert_eq!(h.serial.stats().rx_dropped, 1);
}

#[test]
fn test_overrun_non_fifo_mode() {
    let mut h = Harness::new();
    h.serial.write8(UART_MCR, 0x10);
    h.serial.write8(UART_THR, b'x');
    h.serial.write8(UART_THR, b'y');
    let char_time = h.serial.char_time();
    h.advance(char_time * 2);
    assert_eq!(h.serial.rx_fifo_len(), 1);
    assert_eq!(h.serial.read8(UART_LSR) & 0x03, 0x03);
    assert_eq!(h.serial.read8(UART_RBR), b'x');
}

#[test]
fn test_burst_waits_for_fifo_space() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    let data: Vec<u8> = (0..32).collect();
    h.receive(&data);
    assert_eq!(h.serial.rx_fifo_len(), 16);
    assert_eq!(h.serial.read8(UART_LSR) & 0x02, 0);
    assert_eq!(h.drain_rx(), data);
    assert_eq!(h.serial.stats().rx_dropped, 0);
    assert_eq!(h.serial.stats().rx_bytes, 32);
}

#[test]
fn test_inbound_queue_overflow_reports_overrun() {
    let mut h = Harness::with_backend(
        SerialConfig {
            inbound_queue_chars: 8,
            ..Default::default()
        },
        |b| b,
    );
    h.serial.inbound().deliver(&(0..12).collect::<Vec<u8>>());
    h.serial.process_inbound();
    assert_eq!(h.serial.read8(UART_LSR) & 0x03, 0x03);
    assert_eq!(h.serial.stats().rx_dropped, 4);
    assert_eq!(h.drain_rx(), (0..8).collect::<Vec<u8>>());
}

#[test]
fn test_error_bits_follow_their_character() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    h.serial.write8(UART_IER, 0x04);
    h.serial.inbound().deliver(b"ab");
    h.serial.inbound().deliver_break();
    h.serial.process_inbound();
    // The break is buffered but not yet at the head.
    assert!(!h.line.is_high());

    let mut received = Vec::new();
    loop {
        let lsr = h.serial.read8(UART_LSR);
        if lsr & 0x01 == 0 {
            break;
        }
        received.push((h.serial.read8(UART_RBR), lsr & 0x10 != 0, lsr & 0x80 != 0));
    }
    assert_eq!(
        received,
        vec![(b'a', false, true), (b'b', false, true), (0, true, true)]
    );
    assert!(!h.line.is_high());
}

#[test]
fn test_trigger_levels() {
    for (fcr, trigger) in [(0x01, 1), (0x41, 4), (0x81, 8), (0xc1, 14)] {
        let mut h = Harness::new();
        h.serial.write8(UART_FCR, fcr);
        h.serial.write8(UART_IER, 0x01);
        for i in 0..trigger - 1 {
            h.receive(&[i as u8]);
            assert!(!h.line.is_high(), "asserted early at trigger {trigger}");
        }
        h.receive(&[0xff]);
        assert!(h.line.is_high(), "not asserted at trigger {trigger}");
        assert_eq!(h.serial.read8(UART_IIR), 0xc4);
    }
}

#[test]
fn test_lowering_trigger_asserts_immediately() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0xc1);
    h.serial.write8(UART_IER, 0x01);
    h.receive(b"abcd");
    assert!(!h.line.is_high());
    h.serial.write8(UART_FCR, 0x41);
    assert!(h.line.is_high());
    h.serial.write8(UART_FCR, 0x81);
    assert!(!h.line.is_high());
}

#[test]
fn test_receive_timeout() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.serial.write8(UART_FCR, 0x81);
    h.serial.write8(UART_IER, 0x01);
    h.receive(b"ab");
    let timeout = h.serial.char_time() * 4;

    h.advance(timeout - Duration::from_nanos(1));
    assert!(!h.line.is_high());
    // A new arrival restarts the idle gap.
    h.receive(b"c");
    h.advance(timeout - Duration::from_nanos(1));
    assert!(!h.line.is_high());
    h.advance(Duration::from_nanos(1));
    assert!(h.line.is_high());
    assert_eq!(h.serial.read8(UART_IIR), 0xcc);

    // Reading a character clears the timeout and restarts the timer.
    assert_eq!(h.serial.read8(UART_RBR), b'a');
    assert!(!h.line.is_high());
    h.advance(timeout);
    assert!(h.line.is_high());
    assert_eq!(h.drain_rx(), b"bc");
    assert!(!h.line.is_high());
    h.advance(timeout);
    assert!(!h.line.is_high());
}

#[test]
fn test_no_timeout_in_non_fifo_mode() {
    let mut h = Harness::new();
    h.serial.write8(UART_IER, 0x01);
    h.receive(b"a");
    assert_eq!(h.serial.read8(UART_IIR), 0x04);
    h.advance(Duration::from_secs(1));
    assert_eq!(h.serial.read8(UART_IIR), 0x04);
}

#[test]
fn test_transmit_pacing() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.set_divisor(12);
    h.serial.write8(UART_FCR, 0x01);
    for b in b"hello" {
        h.serial.write8(UART_THR, *b);
    }
    let char_time = h.serial.char_time();
    assert_eq!(char_time, Duration::from_nanos(1_041_666));
    assert_eq!(h.backend.output(), b"h");

    h.advance(char_time * 10);
    let timed = h.backend.timed_output();
    assert_eq!(timed.iter().map(|&(_, b)| b).collect::<Vec<_>>(), b"hello");
    for (i, &(t, _)) in timed.iter().enumerate() {
        assert_eq!(t, char_time * i as u32);
    }
}

#[test]
fn test_divisor_change_not_retroactive() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.set_divisor(12);
    h.serial.write8(UART_FCR, 0x01);
    let slow = h.serial.char_time();
    h.serial.write8(UART_THR, b'a');
    h.serial.write8(UART_THR, b'b');
    h.serial.write8(UART_THR, b'c');
    h.set_divisor(1);
    let fast = h.serial.char_time();
    assert!(fast < slow);

    h.advance(fast);
    // The armed character still takes the old time.
    assert_eq!(h.backend.output(), b"a");
    h.advance(slow - fast);
    assert_eq!(h.backend.output(), b"ab");
    h.advance(fast);
    assert_eq!(h.backend.output(), b"abc");
    let timed = h.backend.timed_output();
    assert_eq!(timed[1].0, slow);
    assert_eq!(timed[2].0, slow + fast);
}

#[test]
fn test_interrupt_priority() {
    let mut h = Harness::new();
    h.serial.write8(UART_IER, 0x07);
    assert_eq!(h.serial.read8(UART_IIR) & 0x0f, 0x02);
    h.serial.write8(UART_IER, 0x00);
    h.serial.write8(UART_IER, 0x06);
    h.serial.inbound().deliver_break();
    h.serial.process_inbound();
    assert!(h.line.is_high());
    // The break outranks the pending THR empty interrupt.
    assert_eq!(h.serial.read8(UART_IIR), 0x06);
    h.serial.read8(UART_LSR);
    // The hidden THR pending flag survived the IIR read.
    assert_eq!(h.serial.read8(UART_IIR), 0x02);
    assert!(!h.line.is_high());
    assert_eq!(h.serial.read8(UART_IIR), 0x01);
}

#[test]
fn test_thr_empty_interrupt_after_transmit() {
    let mut h = Harness::new();
    h.serial.write8(UART_IER, 0x02);
    assert!(h.line.is_high());
    h.serial.write8(UART_THR, b'a');
    assert!(!h.line.is_high());
    // The holding register is free again but the shifter is busy.
    assert_eq!(h.serial.read8(UART_LSR) & 0x60, 0x20);
    let char_time = h.serial.char_time();
    h.advance(char_time);
    assert!(h.line.is_high());
    assert_eq!(h.serial.read8(UART_LSR) & 0x60, 0x60);
    assert_eq!(h.serial.read8(UART_IIR), 0x02);
    assert!(!h.line.is_high());
}

#[test]
fn test_modem_status_interrupt() {
    let mut h = Harness::new();
    let inbound = h.serial.inbound();
    h.serial.write8(UART_IER, 0x08);
    inbound.set_modem_lines(ModemLines {
        dcd: false,
        ..ModemLines::CONNECTED
    });
    assert!(!h.line.is_high());
    h.serial.process_inbound();
    assert!(h.line.is_high());
    assert_eq!(h.serial.read8(UART_IIR), 0x00);
    // DCD dropped, CTS and DSR still up, delta DCD set.
    assert_eq!(h.serial.read8(UART_MSR), 0x38);
    assert!(!h.line.is_high());
    assert_eq!(h.serial.read8(UART_MSR), 0x30);
}

#[test]
fn test_ring_indicator_trailing_edge() {
    let mut h = Harness::new();
    let inbound = h.serial.inbound();
    inbound.set_modem_lines(ModemLines {
        ri: true,
        ..ModemLines::CONNECTED
    });
    h.serial.process_inbound();
    assert_eq!(h.serial.read8(UART_MSR), 0xf0);
    inbound.set_modem_lines(ModemLines::CONNECTED);
    h.serial.process_inbound();
    assert_eq!(h.serial.read8(UART_MSR), 0xb4);
}

#[test]
fn test_polled_modem_lines() {
    let mut h = Harness::with_backend(SerialConfig::default(), |b| {
        b.set_lines(Some(ModemLines::CONNECTED));
        b
    });
    h.serial.write8(UART_IER, 0x08);
    assert!(!h.line.is_high());
    h.backend.set_lines(Some(ModemLines::default()));
    h.advance(Duration::from_millis(10));
    assert!(h.line.is_high());
    assert_eq!(h.serial.read8(UART_MSR), 0x0b);
    h.serial.write8(UART_IER, 0x00);
    assert_eq!(h.clock.armed(), 0);
}

#[test]
fn test_loopback() {
    let mut h = Harness::new();
    h.serial.write8(UART_MCR, 0x10);
    h.serial.write8(UART_THR, 0x41);
    assert_eq!(h.serial.rx_fifo_len(), 1);
    assert_eq!(h.serial.read8(UART_RBR), 0x41);
    assert!(h.backend.output().is_empty());

    // Transport input is ignored while looped back.
    h.receive(b"zz");
    assert_eq!(h.serial.rx_fifo_len(), 0);
}

#[test]
fn test_loopback_modem_status() {
    let mut h = Harness::new();
    h.serial.write8(UART_MCR, 0x10);
    // Entering loopback drops the peer's lines.
    assert_eq!(h.serial.read8(UART_MSR), 0x0b);
    // RTS -> CTS, DTR -> DSR, OUT1 -> RI, OUT2 -> DCD.
    h.serial.write8(UART_MCR, 0x1f);
    assert_eq!(h.serial.read8(UART_MSR), 0xfb);
    h.serial.write8(UART_MCR, 0x12);
    assert_eq!(h.serial.read8(UART_MSR) & 0xf0, 0x10);
}

#[test]
fn test_loopback_break() {
    let mut h = Harness::new();
    h.serial.write8(UART_MCR, 0x10);
    h.serial.write8(UART_IER, 0x04);
    h.serial.write8(UART_LCR, LCR_8N1 | 0x40);
    assert!(h.line.is_high());
    assert_eq!(h.serial.read8(UART_IIR), 0x06);
    assert_eq!(h.serial.read8(UART_LSR) & 0x11, 0x11);
    assert_eq!(h.serial.read8(UART_RBR), 0);
    // Rewriting the same break state is not a new edge.
    h.serial.write8(UART_LCR, LCR_8N1 | 0x40);
    assert_eq!(h.serial.rx_fifo_len(), 0);
    h.serial.write8(UART_LCR, LCR_8N1);
    assert_eq!(h.serial.rx_fifo_len(), 0);
    assert!(!h.line.is_high());
}

#[test]
fn test_break_forwarded_to_transport() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1 | 0x40);
    h.serial.write8(UART_LCR, LCR_8N1 | 0x40);
    h.serial.write8(UART_LCR, LCR_8N1);
    assert_eq!(h.backend.breaks(), vec![true, false]);
}

#[test]
fn test_break_from_transport() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    h.serial.inbound().deliver_break();
    h.serial.process_inbound();
    assert_eq!(h.serial.read8(UART_LSR), 0xf1);
    assert_eq!(h.serial.read8(UART_RBR), 0);
    assert_eq!(h.serial.read8(UART_LSR), 0x60);
}

#[test]
fn test_non_fifo_back_to_back_writes() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.set_divisor(12);
    for b in b"12345" {
        h.serial.write8(UART_THR, *b);
    }
    // One character goes straight to the shifter, the holding register keeps
    // the last write.
    assert_eq!(h.backend.output(), b"1");
    let char_time = h.serial.char_time();
    h.advance(char_time * 5);
    assert_eq!(h.backend.output(), b"15");
    assert_eq!(h.backend.timed_output()[1].0, char_time);
    assert_eq!(h.serial.stats().tx_dropped, 3);
}

#[test]
fn test_tx_fifo_full_drops_newest() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    for b in 0..20u8 {
        h.serial.write8(UART_THR, b);
    }
    // One in the shifter, sixteen buffered.
    assert_eq!(h.serial.tx_fifo_len(), 16);
    h.advance(Duration::from_secs(1));
    assert_eq!(h.backend.output(), (0..17).collect::<Vec<u8>>());
    assert_eq!(h.serial.stats().tx_dropped, 3);
}

#[test]
fn test_dlab_multiplexing() {
    let mut h = Harness::new();
    h.serial.write8(UART_IER, 0x05);
    h.serial.write8(UART_LCR, 0x83);
    h.serial.write8(UART_DLL, 0x01);
    h.serial.write8(UART_DLM, 0x02);
    assert_eq!(h.serial.read8(UART_DLL), 0x01);
    assert_eq!(h.serial.read8(UART_DLM), 0x02);
    assert!(h.backend.output().is_empty());
    h.serial.write8(UART_LCR, 0x03);
    assert_eq!(h.serial.read8(UART_IER), 0x05);
    let params = h.backend.line_params().unwrap();
    assert_eq!(params.baud_rate, 115_200 / 0x0201);
    assert_eq!(params.data_bits, 8);
}

#[test]
fn test_modem_control_forwarded() {
    let mut h = Harness::new();
    h.serial.write8(UART_MCR, 0x03);
    assert_eq!(h.backend.modem_control(), Some((true, true)));
    h.serial.write8(UART_MCR, 0x01);
    assert_eq!(h.backend.modem_control(), Some((true, false)));
}

#[test]
fn test_out2_gating() {
    let mut h = Harness::with_backend(
        SerialConfig {
            out2_gates_interrupt: true,
            ..Default::default()
        },
        |b| b,
    );
    h.serial.write8(UART_IER, 0x02);
    assert!(!h.line.is_high());
    assert_eq!(h.serial.read8(UART_IIR), 0x02);
    h.serial.write8(UART_IER, 0x00);
    h.serial.write8(UART_MCR, 0x08);
    h.serial.write8(UART_IER, 0x02);
    assert!(h.line.is_high());
}

#[test]
fn test_reset_restores_defaults() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    h.serial.write8(UART_IER, 0x0f);
    h.serial.write8(UART_SCR, 0x77);
    h.receive(b"abc");
    h.serial.write8(UART_THR, b'x');
    assert!(h.line.is_high());
    h.serial.reset();
    assert!(!h.line.is_high());
    assert_eq!(h.clock.armed(), 0);
    assert_eq!(h.serial.rx_fifo_len(), 0);
    assert_eq!(h.serial.read8(UART_IIR), 0x01);
    assert_eq!(h.serial.read8(UART_SCR), 0);
    h.serial.write8(UART_LCR, 0x80);
    assert_eq!(h.serial.read8(UART_DLL), 12);
}

#[test]
fn test_save_restore_round_trip() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.serial.write8(UART_FCR, 0x81);
    h.serial.write8(UART_IER, 0x0f);
    h.serial.write8(UART_SCR, 0x42);
    h.receive(b"hi");
    for b in b"out" {
        h.serial.write8(UART_THR, *b);
    }
    let snapshot = h.serial.save();
    let bytes = snapshot.to_bytes().unwrap();

    let mut other = Harness::new();
    other
        .serial
        .restore(&SerialSnapshot::from_bytes(&bytes).unwrap())
        .unwrap();
    assert_eq!(other.serial.save(), snapshot);
    assert_eq!(other.line.is_high(), h.line.is_high());

    for offset in [UART_IER, UART_LCR, UART_MCR, UART_SCR] {
        assert_eq!(other.serial.read8(offset), h.serial.read8(offset));
    }
    assert_eq!(other.serial.read8(UART_IIR), h.serial.read8(UART_IIR));
    assert_eq!(other.drain_rx(), h.drain_rx());

    // Both finish transmitting on the same schedule.
    let char_time = h.serial.char_time();
    h.advance(char_time * 3);
    other.advance(char_time * 3);
    assert_eq!(h.backend.output(), b"out");
    assert_eq!(other.backend.output(), b"ut");
}

#[test]
fn test_restore_resumes_receive_timeout() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.serial.write8(UART_FCR, 0x81);
    h.serial.write8(UART_IER, 0x01);
    h.receive(b"ab");
    let char_time = h.serial.char_time();
    h.advance(char_time * 2);
    let snapshot = h.serial.save();
    assert_eq!(snapshot.rx_timeout_remaining, Some(char_time * 2));

    let mut other = Harness::new();
    other.serial.restore(&snapshot).unwrap();
    assert!(!other.line.is_high());
    other.advance(char_time * 2 - Duration::from_nanos(1));
    assert!(!other.line.is_high());
    other.advance(Duration::from_nanos(1));
    assert!(other.line.is_high());
    assert_eq!(other.serial.read8(UART_IIR), 0xcc);
    assert_eq!(other.drain_rx(), b"ab");
}

#[test]
fn test_restore_loopback_break_state() {
    let mut h = Harness::new();
    h.serial.write8(UART_LCR, LCR_8N1);
    h.serial.write8(UART_MCR, 0x10);
    h.serial.write8(UART_IER, 0x04);
    h.serial.write8(UART_LCR, LCR_8N1 | 0x40);
    assert!(h.line.is_high());
    let snapshot = h.serial.save();

    let mut other = Harness::new();
    other.serial.restore(&snapshot).unwrap();
    assert!(other.line.is_high());
    assert_eq!(other.serial.read8(UART_MCR), 0x10);
    assert_eq!(other.serial.read8(UART_LCR), LCR_8N1 | 0x40);
    // Break is already on; rewriting it is not a new edge.
    other.serial.write8(UART_LCR, LCR_8N1 | 0x40);
    assert_eq!(other.serial.rx_fifo_len(), 1);
    assert_eq!(other.serial.read8(UART_LSR), 0x71);
    assert_eq!(other.serial.read8(UART_RBR), 0);
    assert!(!other.line.is_high());

    // Still looped back: output lands in the receive FIFO.
    other.serial.write8(UART_THR, 0x55);
    assert_eq!(other.serial.read8(UART_RBR), 0x55);
    other.serial.write8(UART_LCR, LCR_8N1);
    assert!(other.backend.output().is_empty());
    assert!(other.backend.breaks().is_empty());
}

#[test]
fn test_transport_thread_delivery() {
    let mut h = Harness::new();
    h.serial.write8(UART_FCR, 0x01);
    let inbound = h.serial.inbound();
    let reader = uart16550::backend::spawn_reader("test", &b"from host"[..], inbound).unwrap();
    reader.join().unwrap().unwrap();
    h.serial.process_inbound();
    assert_eq!(h.drain_rx(), b"from host");
    // EOF shows up as the carrier dropping.
    assert_eq!(h.serial.read8(UART_MSR) & 0x80, 0);
}

#[test]
fn test_poll_device_wakes_on_input() {
    use futures::task::noop_waker;
    use std::task::Context;

    let mut h = Harness::new();
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    h.serial.poll_device(&mut cx);
    h.serial.inbound().deliver(b"k");
    assert_eq!(h.serial.rx_fifo_len(), 0);
    h.serial.poll_device(&mut cx);
    assert_eq!(h.serial.read8(UART_RBR), b'k');
}
