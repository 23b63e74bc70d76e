use std::ops::ControlFlow;

use crate::error::Result;

/// Callback invoked once per drained record with `(type_id, record)`.
///
/// Returning `ControlFlow::Break` stops the drain after the current record,
/// which is still counted as consumed.
pub type RecordHandler<'a> = dyn FnMut(u32, &[u8]) -> ControlFlow<()> + 'a;

/// A single ordered channel of complete, type-tagged records.
///
/// Every record is one complete frame: readers never observe partial
/// records and writers either append the whole record or fail.
pub trait MessageRing: Send + Sync {
    /// Drain every record currently available, in arrival order.
    ///
    /// Never blocks; returns 0 when the ring is empty or closed. Records
    /// written while the drain runs, including by the handler itself, are
    /// left for the next call.
    fn read(&self, handler: &mut RecordHandler<'_>) -> usize;

    /// Append one record.
    fn write(&self, type_id: u32, record: &[u8]) -> Result<()>;

    /// Total capacity in bytes.
    fn capacity(&self) -> usize;

    /// Largest record the ring accepts.
    fn max_record_len(&self) -> usize;

    /// Release the ring. Terminal.
    fn close(&self);

    /// Whether [`close`](MessageRing::close) has been called.
    fn is_closed(&self) -> bool;
}
