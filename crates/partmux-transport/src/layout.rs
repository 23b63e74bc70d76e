use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::memory::MemoryRing;
use crate::traits::MessageRing;

/// Default capacity of the inbound streams ring: 64 KiB.
pub const DEFAULT_STREAMS_CAPACITY: usize = 64 * 1024;

/// Default capacity of the outbound throttle ring: 16 KiB.
pub const DEFAULT_THROTTLE_CAPACITY: usize = 16 * 1024;

/// Ring sizing for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Capacity of the inbound ring carrying data-bearing frames.
    pub streams_capacity: usize,
    /// Capacity of the outbound ring carrying Window and Reset frames.
    pub throttle_capacity: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            streams_capacity: DEFAULT_STREAMS_CAPACITY,
            throttle_capacity: DEFAULT_THROTTLE_CAPACITY,
        }
    }
}

/// The storage region behind one partition: an inbound `streams` ring and
/// an outbound `throttle` ring.
///
/// Both rings are shared handles so the peer on the other side of the
/// region can write streams and read throttle frames.
#[derive(Clone)]
pub struct StreamsLayout {
    streams: Arc<dyn MessageRing>,
    throttle: Arc<dyn MessageRing>,
}

impl StreamsLayout {
    /// Allocate both rings in memory.
    pub fn new(config: RingConfig) -> Result<Self> {
        let streams = MemoryRing::new(config.streams_capacity)?;
        let throttle = MemoryRing::new(config.throttle_capacity)?;
        Ok(Self::from_rings(Arc::new(streams), Arc::new(throttle)))
    }

    /// Pair two existing rings.
    pub fn from_rings(streams: Arc<dyn MessageRing>, throttle: Arc<dyn MessageRing>) -> Self {
        Self { streams, throttle }
    }

    /// Inbound ring of data-bearing frames.
    pub fn streams(&self) -> &Arc<dyn MessageRing> {
        &self.streams
    }

    /// Outbound ring of Window and Reset frames.
    pub fn throttle(&self) -> &Arc<dyn MessageRing> {
        &self.throttle
    }

    /// Release both rings. Terminal for every holder of this layout.
    pub fn close(&self) {
        self.streams.close();
        self.throttle.close();
        info!(
            streams_capacity = self.streams.capacity(),
            throttle_capacity = self.throttle.capacity(),
            "streams layout closed"
        );
    }

    /// Whether the layout has been closed.
    pub fn is_closed(&self) -> bool {
        self.streams.is_closed() && self.throttle.is_closed()
    }
}

impl std::fmt::Debug for StreamsLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamsLayout")
            .field("streams_capacity", &self.streams.capacity())
            .field("throttle_capacity", &self.throttle.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
