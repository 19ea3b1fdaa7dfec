//! Fixed-capacity character FIFO
//!
//! Each slot carries the data byte and the LSR error bits latched when the
//! character was received (parity, framing, break). Transmit FIFOs leave the
//! tags at zero.

/// Largest FIFO a port can be configured with.
pub const MAX_FIFO_DEPTH: usize = 256;

/// Ring buffer with a configurable active depth and receive trigger level.
///
/// The storage always holds `capacity` slots. `depth` is the number of slots
/// the chip currently exposes: the full capacity in FIFO mode, one slot in
/// 16450 mode. Shrinking the depth never discards buffered bytes; pushes are
/// refused until the buffer drains below the new depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialFifo {
    data: Box<[u8]>,
    tags: Box<[u8]>,
    count: usize,
    head: usize,
    tail: usize,
    depth: usize,
    trigger_level: usize,
}

/// Returned by [`SerialFifo::push`] when the active depth is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overrun;

impl SerialFifo {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_FIFO_DEPTH);
        SerialFifo {
            data: vec![0; capacity].into_boxed_slice(),
            tags: vec![0; capacity].into_boxed_slice(),
            count: 0,
            head: 0,
            tail: 0,
            depth: capacity,
            trigger_level: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when a push would be refused at the current depth.
    pub fn is_full(&self) -> bool {
        self.count >= self.depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth.clamp(1, self.capacity());
    }

    pub fn trigger_level(&self) -> usize {
        self.trigger_level
    }

    pub fn set_trigger_level(&mut self, level: usize) {
        self.trigger_level = level.clamp(1, self.capacity());
    }

    /// Appends a character at the tail. A full FIFO keeps its contents and
    /// drops the incoming character.
    pub fn push(&mut self, byte: u8, tag: u8) -> Result<(), Overrun> {
        if self.is_full() {
            return Err(Overrun);
        }
        self.data[self.tail] = byte;
        self.tags[self.tail] = tag;
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
        Ok(())
    }

    /// The oldest character with its tag, left in place.
    pub fn peek(&self) -> Option<(u8, u8)> {
        (self.count > 0).then(|| (self.data[self.head], self.tags[self.head]))
    }

    /// Removes the oldest character with its tag.
    pub fn pop(&mut self) -> Option<(u8, u8)> {
        let entry = self.peek()?;
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        Some(entry)
    }

    /// Replaces the newest character. Used for the single holding slot of
    /// 16450 mode, where a second write overwrites the first.
    pub fn overwrite_newest(&mut self, byte: u8, tag: u8) {
        if self.count == 0 {
            // Nothing to overwrite; a plain push cannot fail here.
            let _ = self.push(byte, tag);
            return;
        }
        let newest = (self.tail + self.capacity() - 1) % self.capacity();
        self.data[newest] = byte;
        self.tags[newest] = tag;
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.head = 0;
        self.tail = 0;
    }

    /// True when any buffered character carries an error tag.
    pub fn has_tagged(&self) -> bool {
        self.iter().any(|(_, tag)| tag != 0)
    }

    /// Iterates buffered characters from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (0..self.count).map(move |i| {
            let idx = (self.head + i) % self.capacity();
            (self.data[idx], self.tags[idx])
        })
    }

    /// Raw ring layout for snapshots: (data, tags, head, tail, count).
    pub fn raw_parts(&self) -> (&[u8], &[u8], usize, usize, usize) {
        (&self.data, &self.tags, self.head, self.tail, self.count)
    }

    /// Rebuilds the ring from a snapshot. Returns `None` if the indices are
    /// inconsistent with the capacity.
    pub fn from_raw_parts(
        data: &[u8],
        tags: &[u8],
        head: usize,
        tail: usize,
        count: usize,
        depth: usize,
        trigger_level: usize,
    ) -> Option<Self> {
        let capacity = data.len();
        if capacity == 0
            || capacity > MAX_FIFO_DEPTH
            || tags.len() != capacity
            || count > capacity
            || head >= capacity
            || tail >= capacity
            || (head + count) % capacity != tail
        {
            return None;
        }
        let mut fifo = SerialFifo {
            data: data.into(),
            tags: tags.into(),
            count,
            head,
            tail,
            depth: capacity,
            trigger_level: 1,
        };
        fifo.set_depth(depth);
        fifo.set_trigger_level(trigger_level);
        Some(fifo)
    }
}
