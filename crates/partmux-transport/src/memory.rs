use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{MessageRing, RecordHandler};

/// Record header: length (4) + type id (4) = 8 bytes.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Records start on 8-byte boundaries.
pub const RECORD_ALIGNMENT: usize = 8;

/// Type id of the filler record written before a wrap.
pub const PADDING_TYPE_ID: u32 = u32::MAX;

/// Smallest accepted ring capacity.
pub const MIN_CAPACITY: usize = 64;

/// In-memory ring of length-prefixed records.
///
/// Record layout:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────┬─────────┐
/// │ Length (4B)  │ Type (4B)    │ Record (Length bytes)│ Padding │
/// │ LE           │ LE           │                      │ to 8B   │
/// └──────────────┴──────────────┴──────────────────────┴─────────┘
/// ```
///
/// A record that would straddle the end of the buffer is preceded by a
/// padding record covering the remainder, and is written at offset 0.
pub struct MemoryRing {
    state: Mutex<RingState>,
    capacity: usize,
    max_record_len: usize,
    closed: AtomicBool,
}

struct RingState {
    buf: Box<[u8]>,
    /// Absolute read position.
    head: u64,
    /// Absolute write position.
    tail: u64,
}

impl MemoryRing {
    /// Allocate a ring with `capacity` bytes (power of two, >= [`MIN_CAPACITY`]).
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < MIN_CAPACITY || !capacity.is_power_of_two() {
            return Err(TransportError::InvalidCapacity(capacity));
        }

        Ok(Self {
            state: Mutex::new(RingState {
                buf: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
            }),
            capacity,
            max_record_len: capacity / 8,
            closed: AtomicBool::new(false),
        })
    }

    /// Bytes currently occupied by unread records (padding included).
    pub fn size(&self) -> usize {
        let state = self.state.lock();
        (state.tail - state.head) as usize
    }

    /// Whether no unread records remain.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn mask(&self) -> u64 {
        (self.capacity - 1) as u64
    }

    /// Copy the next record before `end` into `into` and consume it. The
    /// lock is held only for the copy.
    fn take_record(&self, end: u64, into: &mut Vec<u8>) -> Option<u32> {
        let mask = self.mask();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        while state.head < end.min(state.tail) {
            let index = (state.head & mask) as usize;
            let mut header = &state.buf[index..index + RECORD_HEADER_SIZE];
            let len = header.get_u32_le() as usize;
            let type_id = header.get_u32_le();
            state.head += aligned_len(RECORD_HEADER_SIZE + len) as u64;

            if type_id == PADDING_TYPE_ID {
                continue;
            }

            let start = index + RECORD_HEADER_SIZE;
            into.clear();
            into.extend_from_slice(&state.buf[start..start + len]);
            return Some(type_id);
        }

        None
    }
}

impl MessageRing for MemoryRing {
    fn read(&self, handler: &mut RecordHandler<'_>) -> usize {
        if self.is_closed() {
            return 0;
        }

        // Records appended while draining wait for the next read.
        let end = self.state.lock().tail;
        let mut record = Vec::with_capacity(self.max_record_len);
        let mut count = 0usize;

        while let Some(type_id) = self.take_record(end, &mut record) {
            count += 1;
            if handler(type_id, &record).is_break() {
                break;
            }
        }

        count
    }

    fn write(&self, type_id: u32, record: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if type_id == PADDING_TYPE_ID {
            return Err(TransportError::ReservedType(type_id));
        }
        if record.is_empty() {
            return Err(TransportError::Empty);
        }
        if record.len() > self.max_record_len {
            return Err(TransportError::Oversized {
                len: record.len(),
                max: self.max_record_len,
            });
        }

        let mask = self.mask();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let aligned = aligned_len(RECORD_HEADER_SIZE + record.len());
        let available = self.capacity - (state.tail - state.head) as usize;
        let tail_index = (state.tail & mask) as usize;
        let to_end = self.capacity - tail_index;
        let padding = if aligned > to_end { to_end } else { 0 };

        if aligned + padding > available {
            return Err(TransportError::Full {
                needed: aligned + padding,
                available,
            });
        }

        if padding > 0 {
            let mut header = &mut state.buf[tail_index..tail_index + RECORD_HEADER_SIZE];
            header.put_u32_le((padding - RECORD_HEADER_SIZE) as u32);
            header.put_u32_le(PADDING_TYPE_ID);
            state.tail += padding as u64;
        }

        let index = (state.tail & mask) as usize;
        let mut slot = &mut state.buf[index..index + RECORD_HEADER_SIZE + record.len()];
        slot.put_u32_le(record.len() as u32);
        slot.put_u32_le(type_id);
        slot.put_slice(record);
        state.tail += aligned as u64;

        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn max_record_len(&self) -> usize {
        self.max_record_len
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(capacity = self.capacity, "memory ring closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for MemoryRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRing")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn aligned_len(len: usize) -> usize {
    (len + RECORD_ALIGNMENT - 1) & !(RECORD_ALIGNMENT - 1)
}
