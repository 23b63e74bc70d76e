//! Record-oriented ring transport for partmux partitions.
//!
//! A partition reads data-bearing frames from one ring and writes control
//! frames to another. Each ring is a single ordered channel of complete,
//! type-tagged records:
//! - [`MessageRing`] is the read/write contract the partition consumes
//! - [`MemoryRing`] is the fixed-capacity in-memory implementation
//! - [`StreamsLayout`] pairs the inbound and outbound ring of one region
//!
//! This is the lowest layer of partmux. How the backing memory is mapped or
//! sized by a host process is not this crate's concern.

pub mod error;
pub mod layout;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use layout::{RingConfig, StreamsLayout, DEFAULT_STREAMS_CAPACITY, DEFAULT_THROTTLE_CAPACITY};
pub use memory::{MemoryRing, PADDING_TYPE_ID, RECORD_HEADER_SIZE};
pub use traits::{MessageRing, RecordHandler};
