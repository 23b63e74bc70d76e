use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use partmux_frame::{build_reset, build_window, WindowView, RESET, WINDOW};
use partmux_transport::MessageRing;
use tracing::{debug, trace};

use crate::channel::StreamState;
use crate::error::{PartitionError, Result};

/// Writes Window and Reset frames to a partition's throttle ring.
///
/// Cheap to clone; every clone shares the one scratch buffer and ring, so
/// frames appear on the ring in call order.
#[derive(Clone)]
pub struct FlowControlEmitter {
    inner: Arc<EmitterInner>,
}

struct EmitterInner {
    partition: Arc<str>,
    throttle: Arc<dyn MessageRing>,
    scratch: Mutex<Vec<u8>>,
}

impl FlowControlEmitter {
    pub(crate) fn new(
        partition: Arc<str>,
        throttle: Arc<dyn MessageRing>,
        scratch_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                partition,
                throttle,
                scratch: Mutex::new(vec![0u8; scratch_capacity]),
            }),
        }
    }

    /// Grant `update` more bytes of credit to the sender of `owner`'s stream.
    ///
    /// The owner's cumulative window is raised before the Window frame is
    /// written and lowered again if the write fails. Returns the owner's new
    /// total. Negative updates fail before anything changes.
    pub fn signal_credit(&self, owner: &StreamState, update: i32) -> Result<i64> {
        let stream_id = owner.source_id();
        if update < 0 {
            return Err(PartitionError::NegativeCredit { stream_id, update });
        }

        let mut scratch = self.inner.scratch.lock();
        let window = WindowView::wrap(build_window(&mut scratch, stream_id, update)?)?;

        let total = owner.grant(window.update());
        if let Err(err) = self.inner.throttle.write(WINDOW, window.as_bytes()) {
            owner.grant(-window.update());
            return Err(err.into());
        }

        trace!(
            partition = %self.inner.partition,
            stream_id,
            update,
            total,
            "window signalled"
        );
        Ok(total)
    }

    /// Abnormally terminate `stream_id` in the direction of its sender.
    pub fn signal_reset(&self, stream_id: u64) -> Result<()> {
        let mut scratch = self.inner.scratch.lock();
        let reset = build_reset(&mut scratch, stream_id)?;
        self.inner.throttle.write(RESET, reset)?;

        debug!(partition = %self.inner.partition, stream_id, "reset signalled");
        Ok(())
    }

    /// Name of the partition this emitter writes for.
    pub fn partition(&self) -> &str {
        &self.inner.partition
    }
}

impl fmt::Debug for FlowControlEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowControlEmitter")
            .field("partition", &self.inner.partition)
            .field("scratch_capacity", &self.inner.scratch.lock().len())
            .finish()
    }
}
