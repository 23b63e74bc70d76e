//! Partition dispatch for partmux.
//!
//! A [`Partition`] drains its inbound streams ring and routes every frame:
//! frames for an installed stream go straight to that stream's
//! [`MessageHandler`]; anything else is handed to the handshake, which
//! accepts initial Begins on a route, matches reply Begins to pending
//! opens, and resets everything else. Window and Reset frames flow back
//! through the [`FlowControlEmitter`].
//!
//! Route, stream and correlation tables are shared between partitions and
//! injected through [`PartitionCollaborators`]; [`RouteMap`], [`StreamMap`]
//! and [`CorrelationMap`] are the in-process implementations.
//!
//! # Feature flags
//!
//! - `async`: tokio poll driver ([`drive`]) with cancellation.

pub mod channel;
pub mod collaborators;
pub mod error;
pub mod future;
pub mod handler;
mod handshake;
pub mod partition;
pub mod tables;
pub mod throttle;

#[cfg(feature = "async")]
pub mod driver;

pub use channel::{
    ChannelAddress, ChannelConfig, ChannelObserver, ChildChannel, ClientChannel, PipelineFactory,
    ServerChannel, StreamChannel, StreamState,
};
pub use collaborators::{
    Correlation, CorrelationTable, PartitionCollaborators, RouteTable, StreamFactory,
    StreamRegistry, Target, TargetSupplier,
};
pub use error::{PartitionError, PipelineError, Result};
pub use future::{HandshakeFuture, HandshakeOutcome};
pub use handler::MessageHandler;
pub use partition::{
    AcceptFailurePolicy, Partition, PartitionConfig, PartitionStats, DEFAULT_SCRATCH_CAPACITY,
};
pub use tables::{CorrelationMap, RouteMap, StreamMap};
pub use throttle::FlowControlEmitter;

#[cfg(feature = "async")]
pub use driver::{drive, DriverConfig, MIN_IDLE_BACKOFF};
