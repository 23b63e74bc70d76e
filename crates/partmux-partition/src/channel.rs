//! Channel objects the handshake produces and the stream handlers own.
//!
//! Only the parts the partition touches are modelled here: addresses,
//! configuration inherited on accept, lifecycle notifications, and the
//! per-stream source id and credit total used by flow control.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;

/// Address of one side of a stream: who receives, who sends, on which route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    receiver: String,
    sender: String,
    route_ref: u64,
}

impl ChannelAddress {
    pub fn new(receiver: impl Into<String>, sender: impl Into<String>, route_ref: u64) -> Self {
        Self {
            receiver: receiver.into(),
            sender: sender.into(),
            route_ref,
        }
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn route_ref(&self) -> u64 {
        self.route_ref
    }

    /// Address of the opposite direction: receiver and sender swap, and the
    /// reply carries no route.
    pub fn reply_to(&self) -> Self {
        Self {
            receiver: self.sender.clone(),
            sender: self.receiver.clone(),
            route_ref: 0,
        }
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/streams/{}#{}", self.receiver, self.sender, self.route_ref)
    }
}

/// Channel behavior, inherited by accepted children from their server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Both directions flow over the one stream pairing.
    pub duplex: bool,
    /// Whether the peer honours Window frames.
    pub throttle: bool,
    /// Partition the channel reads from.
    pub read_partition: Option<String>,
    /// Partition the channel writes to.
    pub write_partition: Option<String>,
    /// Initial credit granted to the peer.
    pub window: i32,
    /// Correlation id of the handshake that produced the channel.
    pub correlation: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            duplex: false,
            throttle: true,
            read_partition: None,
            write_partition: None,
            window: 0,
            correlation: 0,
        }
    }
}

/// Source stream id and cumulative credit granted to its sender.
#[derive(Debug, Default)]
pub struct StreamState {
    source_id: AtomicU64,
    source_window: AtomicI64,
}

impl StreamState {
    pub fn source_id(&self) -> u64 {
        self.source_id.load(Ordering::Acquire)
    }

    pub fn set_source_id(&self, stream_id: u64) {
        self.source_id.store(stream_id, Ordering::Release);
    }

    /// Total credit granted so far.
    pub fn source_window(&self) -> i64 {
        self.source_window.load(Ordering::Acquire)
    }

    /// Add `update` to the granted credit and return the new total.
    pub fn grant(&self, update: i32) -> i64 {
        let update = i64::from(update);
        self.source_window.fetch_add(update, Ordering::AcqRel) + update
    }
}

/// Lifecycle notifications for an accepted channel.
pub trait ChannelObserver: Send + Sync {
    /// The child is bound to the server's local address.
    fn on_bound(&self, _channel: &Arc<ChildChannel>, _local: &ChannelAddress) {}

    /// The child is connected to its remote address.
    fn on_connected(&self, _channel: &Arc<ChildChannel>, _remote: &ChannelAddress) {}
}

/// Builds the observer pipeline of every child a server accepts.
pub trait PipelineFactory: Send + Sync {
    fn pipeline(&self) -> Result<Arc<dyn ChannelObserver>, PipelineError>;
}

impl<F> PipelineFactory for F
where
    F: Fn() -> Result<Arc<dyn ChannelObserver>, PipelineError> + Send + Sync,
{
    fn pipeline(&self) -> Result<Arc<dyn ChannelObserver>, PipelineError> {
        self()
    }
}

/// A listening endpoint published under a route reference.
pub struct ServerChannel {
    name: String,
    local_address: ChannelAddress,
    config: ChannelConfig,
    pipeline: Arc<dyn PipelineFactory>,
}

impl ServerChannel {
    pub fn new(
        name: impl Into<String>,
        local_address: ChannelAddress,
        config: ChannelConfig,
        pipeline: Arc<dyn PipelineFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            local_address,
            config,
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route reference active openers address this endpoint by.
    pub fn route_ref(&self) -> u64 {
        self.local_address.route_ref()
    }

    pub fn local_address(&self) -> &ChannelAddress {
        &self.local_address
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn pipeline_factory(&self) -> &Arc<dyn PipelineFactory> {
        &self.pipeline
    }
}

impl fmt::Debug for ServerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerChannel")
            .field("name", &self.name)
            .field("local_address", &self.local_address)
            .field("config", &self.config)
            .finish()
    }
}

/// A channel accepted by a [`ServerChannel`] for an initial Begin.
pub struct ChildChannel {
    parent: String,
    local_address: ChannelAddress,
    remote_address: ChannelAddress,
    config: ChannelConfig,
    observer: Arc<dyn ChannelObserver>,
    write_closed: bool,
    stream: StreamState,
}

impl ChildChannel {
    pub(crate) fn new(
        parent: &str,
        local_address: ChannelAddress,
        remote_address: ChannelAddress,
        config: ChannelConfig,
        observer: Arc<dyn ChannelObserver>,
    ) -> Self {
        let write_closed = !config.duplex;
        Self {
            parent: parent.to_string(),
            local_address,
            remote_address,
            config,
            observer,
            write_closed,
            stream: StreamState::default(),
        }
    }

    /// Name of the server that accepted this child.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn local_address(&self) -> &ChannelAddress {
        &self.local_address
    }

    pub fn remote_address(&self) -> &ChannelAddress {
        &self.remote_address
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn observer(&self) -> &Arc<dyn ChannelObserver> {
        &self.observer
    }

    /// Simplex children cannot write back to the peer.
    pub fn is_write_closed(&self) -> bool {
        self.write_closed
    }

    pub fn stream(&self) -> &StreamState {
        &self.stream
    }
}

impl fmt::Debug for ChildChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildChannel")
            .field("parent", &self.parent)
            .field("local_address", &self.local_address)
            .field("remote_address", &self.remote_address)
            .field("config", &self.config)
            .field("write_closed", &self.write_closed)
            .field("stream", &self.stream)
            .finish()
    }
}

/// A channel that actively opened a stream and awaits the reply Begin.
#[derive(Debug)]
pub struct ClientChannel {
    remote_address: ChannelAddress,
    config: ChannelConfig,
    stream: StreamState,
}

impl ClientChannel {
    pub fn new(remote_address: ChannelAddress, config: ChannelConfig) -> Self {
        Self {
            remote_address,
            config,
            stream: StreamState::default(),
        }
    }

    pub fn remote_address(&self) -> &ChannelAddress {
        &self.remote_address
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn stream(&self) -> &StreamState {
        &self.stream
    }
}

/// The channel a new stream handler is created for.
#[derive(Debug, Clone)]
pub enum StreamChannel {
    /// Passive side, produced by an initial Begin on a route.
    Accepted(Arc<ChildChannel>),
    /// Active side, matched by a reply Begin's correlation id.
    Connected(Arc<ClientChannel>),
}

impl StreamChannel {
    pub fn stream(&self) -> &StreamState {
        match self {
            StreamChannel::Accepted(child) => child.stream(),
            StreamChannel::Connected(client) => client.stream(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        match self {
            StreamChannel::Accepted(child) => child.config(),
            StreamChannel::Connected(client) => client.config(),
        }
    }

    pub fn remote_address(&self) -> &ChannelAddress {
        match self {
            StreamChannel::Accepted(child) => child.remote_address(),
            StreamChannel::Connected(client) => client.remote_address(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, StreamChannel::Accepted(_))
    }
}
