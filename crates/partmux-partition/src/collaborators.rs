//! Interfaces the partition consumes but does not own.
//!
//! Tables are shared by every partition of a process, so implementations
//! must tolerate concurrent lookups alongside single-writer-per-key inserts.

use std::sync::Arc;

use crate::channel::{ChildChannel, ClientChannel, ServerChannel, StreamChannel};
use crate::error::Result;
use crate::future::HandshakeFuture;
use crate::handler::MessageHandler;
use crate::throttle::FlowControlEmitter;

/// Route reference -> listening endpoint.
pub trait RouteTable: Send + Sync {
    fn lookup_route(&self, route_ref: u64) -> Option<Arc<ServerChannel>>;
}

/// Stream id -> installed handler.
pub trait StreamRegistry: Send + Sync {
    fn lookup_stream(&self, stream_id: u64) -> Option<Arc<dyn MessageHandler>>;

    /// Install `handler` for `stream_id`. Never replaces an existing entry;
    /// fails with [`PartitionError::DuplicateStream`](crate::PartitionError::DuplicateStream).
    fn register_stream(&self, stream_id: u64, handler: Arc<dyn MessageHandler>) -> Result<()>;

    /// Retire `stream_id`, returning its handler if one was installed.
    fn unregister_stream(&self, stream_id: u64) -> Option<Arc<dyn MessageHandler>>;
}

/// Correlation id -> pending active open.
pub trait CorrelationTable: Send + Sync {
    /// Claim the pending open for `correlation_id`. A claimed entry is gone.
    fn correlate(&self, correlation_id: u64) -> Option<Correlation>;
}

/// Produces the handler that owns a newly established stream.
pub trait StreamFactory: Send + Sync {
    fn new_stream(
        &self,
        channel: StreamChannel,
        emitter: FlowControlEmitter,
        handshake: HandshakeFuture,
    ) -> Arc<dyn MessageHandler>;
}

impl<F> StreamFactory for F
where
    F: Fn(StreamChannel, FlowControlEmitter, HandshakeFuture) -> Arc<dyn MessageHandler>
        + Send
        + Sync,
{
    fn new_stream(
        &self,
        channel: StreamChannel,
        emitter: FlowControlEmitter,
        handshake: HandshakeFuture,
    ) -> Arc<dyn MessageHandler> {
        self(channel, emitter, handshake)
    }
}

/// Outbound side paired with a duplex accept.
pub trait Target: Send + Sync {
    fn on_accepted(
        &self,
        channel: &Arc<ChildChannel>,
        correlation_id: u64,
        handshake: &HandshakeFuture,
    );
}

/// `(remote name, partition name)` -> outbound target.
pub trait TargetSupplier: Send + Sync {
    fn supply_target(&self, remote_name: &str, partition_name: &str) -> Arc<dyn Target>;
}

/// A pending active open awaiting the peer's reply Begin.
#[derive(Debug, Clone)]
pub struct Correlation {
    future: HandshakeFuture,
}

impl Correlation {
    /// Track a connect issued by `channel`.
    pub fn new(channel: Arc<ClientChannel>) -> Self {
        Self {
            future: HandshakeFuture::new(StreamChannel::Connected(channel)),
        }
    }

    /// Handshake completion shared with whoever issued the connect.
    pub fn correlated_future(&self) -> &HandshakeFuture {
        &self.future
    }

    pub fn into_future(self) -> HandshakeFuture {
        self.future
    }
}

/// Everything a partition borrows from its surroundings.
#[derive(Clone)]
pub struct PartitionCollaborators {
    pub routes: Arc<dyn RouteTable>,
    pub streams: Arc<dyn StreamRegistry>,
    pub correlations: Arc<dyn CorrelationTable>,
    pub factory: Arc<dyn StreamFactory>,
    pub targets: Arc<dyn TargetSupplier>,
}
