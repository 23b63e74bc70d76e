//! Partition stream demultiplexing over shared record rings.
//!
//! A partition drains typed frames from an inbound ring, hands each one to
//! the handler installed for its stream, establishes new streams through a
//! Begin handshake, and writes Window and Reset frames to an outbound
//! throttle ring.
//!
//! # Crate Structure
//!
//! - [`transport`] - Fixed-capacity record rings and the per-partition layout
//! - [`frame`] - Zero-copy frame views and scratch-buffer builders
//! - [`partition`] - Dispatch, handshake, shared tables and flow control
//!   (plus the tokio driver behind the `async` feature)

/// Re-export transport types.
pub mod transport {
    pub use partmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use partmux_frame::*;
}

/// Re-export partition types.
pub mod partition {
    pub use partmux_partition::*;

    /// Cancellation handle accepted by [`drive`].
    #[cfg(feature = "async")]
    pub use tokio_util::sync::CancellationToken;
}
