//! Cross-thread handoff from the transport to the port.
//!
//! The transport's I/O context only ever touches the [`Inbox`]; the port
//! drains it on its owner thread, so FIFO and register state are never
//! mutated concurrently with guest register accesses. The port only takes
//! characters the receive FIFO has room for, the rest stay queued. The queue
//! itself is bounded: non-blocking deliveries beyond the bound are dropped and
//! reported to the guest as an overrun, blocking deliveries wait for space.

use crate::backend::ModemLines;
use futures::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InboundEvent {
    Byte(u8),
    Break,
    ModemLines(ModemLines),
}

impl InboundEvent {
    /// Bytes and breaks each occupy a receive FIFO slot.
    pub fn is_char(&self) -> bool {
        matches!(self, InboundEvent::Byte(_) | InboundEvent::Break)
    }
}

#[derive(Debug, Default)]
struct Queue {
    events: VecDeque<InboundEvent>,
    /// Queued characters, bounded by the inbox limit.
    chars: usize,
    /// Characters refused since the owner last drained.
    dropped: u64,
}

pub(crate) struct Inbox {
    queue: Mutex<Queue>,
    space: Condvar,
    waker: AtomicWaker,
    detached: AtomicBool,
    limit: usize,
}

impl Inbox {
    pub fn new(limit: usize) -> Self {
        Inbox {
            queue: Mutex::new(Queue::default()),
            space: Condvar::new(),
            waker: AtomicWaker::new(),
            detached: AtomicBool::new(false),
            limit: limit.max(1),
        }
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Queues `events` in order. Characters past the limit are dropped, or
    /// with `wait` set, wait until the owner drains some.
    fn post(&self, events: impl IntoIterator<Item = InboundEvent>, wait: bool) {
        let mut posted = false;
        {
            let mut queue = self.queue.lock();
            for event in events {
                if event.is_char() {
                    while wait && queue.chars >= self.limit && !self.is_detached() {
                        // The owner must see what is already queued to make room.
                        self.waker.wake();
                        self.space.wait(&mut queue);
                    }
                    if self.is_detached() {
                        return;
                    }
                    if queue.chars >= self.limit {
                        queue.dropped += 1;
                        continue;
                    }
                    queue.chars += 1;
                } else if self.is_detached() {
                    return;
                }
                queue.events.push_back(event);
                posted = true;
            }
        }
        if posted {
            self.waker.wake();
        }
    }

    /// Takes queued events in order while `accept` admits them, stopping at
    /// the first refused one. Also returns how many characters were dropped
    /// since the last call.
    pub fn take_while(
        &self,
        mut accept: impl FnMut(&InboundEvent) -> bool,
    ) -> (Vec<InboundEvent>, u64) {
        let mut queue = self.queue.lock();
        let mut taken = Vec::new();
        while let Some(&event) = queue.events.front() {
            if !accept(&event) {
                break;
            }
            queue.events.pop_front();
            if event.is_char() {
                queue.chars -= 1;
            }
            taken.push(event);
        }
        let dropped = std::mem::take(&mut queue.dropped);
        if !taken.is_empty() {
            self.space.notify_all();
        }
        (taken, dropped)
    }

    pub fn register(&self, waker: &Waker) {
        self.waker.register(waker);
    }

    /// Drops queued events, refuses new ones and releases blocked producers.
    pub fn detach(&self) {
        let mut queue = self.queue.lock();
        self.detached.store(true, Ordering::Release);
        *queue = Queue::default();
        self.space.notify_all();
    }
}

/// Transport-side handle for feeding a serial port.
///
/// Cheap to clone and safe to use from any thread. Events are queued and only
/// take effect when the port's owner calls
/// [`Serial16550::process_inbound`](crate::Serial16550::process_inbound) or
/// [`Serial16550::poll_device`](crate::Serial16550::poll_device), or when a
/// guest read frees receive FIFO space.
#[derive(Clone)]
pub struct SerialInbound {
    pub(crate) inbox: Arc<Inbox>,
}

impl SerialInbound {
    /// Delivers received bytes without blocking. Bytes that do not fit in the
    /// inbound queue are lost and show up as an overrun.
    pub fn deliver(&self, bytes: &[u8]) {
        self.inbox
            .post(bytes.iter().copied().map(InboundEvent::Byte), false);
    }

    /// Delivers received bytes, waiting while the inbound queue is full.
    /// Returns early, discarding the rest, if the port detaches.
    ///
    /// Must not be called from the port's owner thread, which is the one that
    /// makes room.
    pub fn deliver_blocking(&self, bytes: &[u8]) {
        self.inbox
            .post(bytes.iter().copied().map(InboundEvent::Byte), true);
    }

    /// Delivers a break condition detected on the line.
    pub fn deliver_break(&self) {
        self.inbox.post([InboundEvent::Break], false);
    }

    /// Reports the current state of the modem input lines.
    pub fn set_modem_lines(&self, lines: ModemLines) {
        self.inbox.post([InboundEvent::ModemLines(lines)], false);
    }

    /// Reports that the far end went away. Equivalent to all modem lines low.
    pub fn disconnect(&self) {
        self.set_modem_lines(ModemLines::default());
    }

    /// True once the port has been detached; deliveries are discarded.
    pub fn is_detached(&self) -> bool {
        self.inbox.is_detached()
    }
}

impl std::fmt::Debug for SerialInbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialInbound")
            .field("detached", &self.is_detached())
            .finish()
    }
}
