/// Errors that can occur in ring transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Not enough free space for the record; nothing was written.
    #[error("ring full (record needs {needed} bytes, {available} available)")]
    Full { needed: usize, available: usize },

    /// The record exceeds the maximum record length of the ring.
    #[error("record too large ({len} bytes, max {max})")]
    Oversized { len: usize, max: usize },

    /// Zero-length records carry no frame and are refused.
    #[error("empty record")]
    Empty,

    /// The type id is reserved for ring bookkeeping.
    #[error("type id {0:#010x} is reserved")]
    ReservedType(u32),

    /// The requested capacity cannot back a ring.
    #[error("invalid ring capacity {0} (must be a power of two, at least {min})", min = crate::memory::MIN_CAPACITY)]
    InvalidCapacity(usize),

    /// The ring has been closed.
    #[error("ring closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
