use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::channel::{ClientChannel, ServerChannel};
use crate::collaborators::{Correlation, CorrelationTable, RouteTable, StreamRegistry};
use crate::error::{PartitionError, Result};
use crate::future::HandshakeFuture;
use crate::handler::MessageHandler;

/// Shared route table keyed by route reference.
#[derive(Default)]
pub struct RouteMap {
    routes: DashMap<u64, Arc<ServerChannel>>,
}

impl RouteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `server` under its route reference.
    pub fn bind(&self, server: Arc<ServerChannel>) -> Result<()> {
        let route_ref = server.route_ref();
        match self.routes.entry(route_ref) {
            Entry::Occupied(_) => Err(PartitionError::DuplicateRoute(route_ref)),
            Entry::Vacant(slot) => {
                debug!(route_ref, server = server.name(), "route bound");
                slot.insert(server);
                Ok(())
            }
        }
    }

    pub fn unbind(&self, route_ref: u64) -> Option<Arc<ServerChannel>> {
        self.routes.remove(&route_ref).map(|(_, server)| server)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteTable for RouteMap {
    fn lookup_route(&self, route_ref: u64) -> Option<Arc<ServerChannel>> {
        self.routes.get(&route_ref).map(|entry| Arc::clone(entry.value()))
    }
}

/// Shared stream registry keyed by stream id.
#[derive(Default)]
pub struct StreamMap {
    streams: DashMap<u64, Arc<dyn MessageHandler>>,
}

impl StreamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, stream_id: u64) -> bool {
        self.streams.contains_key(&stream_id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl StreamRegistry for StreamMap {
    fn lookup_stream(&self, stream_id: u64) -> Option<Arc<dyn MessageHandler>> {
        // Clone out so the shard lock is released before the handler runs.
        self.streams
            .get(&stream_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn register_stream(&self, stream_id: u64, handler: Arc<dyn MessageHandler>) -> Result<()> {
        match self.streams.entry(stream_id) {
            Entry::Occupied(_) => Err(PartitionError::DuplicateStream(stream_id)),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    fn unregister_stream(&self, stream_id: u64) -> Option<Arc<dyn MessageHandler>> {
        self.streams.remove(&stream_id).map(|(_, handler)| handler)
    }
}

/// Pending active opens keyed by correlation id.
pub struct CorrelationMap {
    pending: DashMap<u64, Correlation>,
    next_correlation_id: AtomicU64,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_correlation_id: AtomicU64::new(1),
        }
    }

    /// Record an active open by `channel` under a freshly minted
    /// correlation id. The returned future completes with the handshake.
    pub fn mint(&self, channel: Arc<ClientChannel>) -> (u64, HandshakeFuture) {
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let correlation = Correlation::new(channel);
        let future = correlation.correlated_future().clone();
        self.pending.insert(correlation_id, correlation);
        (correlation_id, future)
    }

    /// Record an active open under a caller-chosen correlation id.
    pub fn insert(&self, correlation_id: u64, correlation: Correlation) -> Option<Correlation> {
        self.pending.insert(correlation_id, correlation)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for CorrelationMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable for CorrelationMap {
    fn correlate(&self, correlation_id: u64) -> Option<Correlation> {
        self.pending
            .remove(&correlation_id)
            .map(|(_, correlation)| correlation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::channel::{ChannelAddress, ChannelConfig, ChannelObserver, StreamChannel};
    use crate::error::PipelineError;

    struct Quiet;
    impl ChannelObserver for Quiet {}

    fn server(route_ref: u64) -> Arc<ServerChannel> {
        let pipeline =
            || -> std::result::Result<Arc<dyn ChannelObserver>, PipelineError> { Ok(Arc::new(Quiet)) };
        Arc::new(ServerChannel::new(
            "server",
            ChannelAddress::new("target", "source", route_ref),
            ChannelConfig::default(),
            Arc::new(pipeline),
        ))
    }

    fn client() -> Arc<ClientChannel> {
        Arc::new(ClientChannel::new(
            ChannelAddress::new("target", "source", 7),
            ChannelConfig::default(),
        ))
    }

    #[test]
    fn route_bind_lookup_unbind() {
        let routes = RouteMap::new();
        routes.bind(server(7)).unwrap();

        assert_eq!(routes.lookup_route(7).unwrap().route_ref(), 7);
        assert!(routes.lookup_route(9).is_none());
        assert!(matches!(
            routes.bind(server(7)),
            Err(PartitionError::DuplicateRoute(7))
        ));

        assert!(routes.unbind(7).is_some());
        assert!(routes.is_empty());
    }

    #[test]
    fn register_never_overwrites() {
        let streams = StreamMap::new();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&first_calls);
        let first: Arc<dyn MessageHandler> = Arc::new(move |_: u32, _: &[u8]| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        let second: Arc<dyn MessageHandler> = Arc::new(|_: u32, _: &[u8]| {
            panic!("replacement handler must never be installed");
        });

        streams.register_stream(1, first).unwrap();
        assert!(matches!(
            streams.register_stream(1, second),
            Err(PartitionError::DuplicateStream(1))
        ));

        streams.lookup_stream(1).unwrap().on_message(0, b"");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_retires_stream() {
        let streams = StreamMap::new();
        streams
            .register_stream(3, Arc::new(|_: u32, _: &[u8]| {}))
            .unwrap();
        assert!(streams.contains(3));

        assert!(streams.unregister_stream(3).is_some());
        assert!(streams.lookup_stream(3).is_none());
        assert!(streams.unregister_stream(3).is_none());

        // Retired ids may be registered again.
        streams
            .register_stream(3, Arc::new(|_: u32, _: &[u8]| {}))
            .unwrap();
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn correlate_claims_once() {
        let correlations = CorrelationMap::new();
        let (id, future) = correlations.mint(client());
        assert_eq!(id, 1);
        assert_eq!(correlations.len(), 1);

        let claimed = correlations.correlate(id).unwrap();
        assert!(matches!(
            claimed.correlated_future().channel(),
            StreamChannel::Connected(_)
        ));
        assert!(correlations.correlate(id).is_none());

        claimed.correlated_future().succeed();
        assert!(future.is_success());
    }

    #[test]
    fn minted_ids_are_distinct() {
        let correlations = CorrelationMap::new();
        let (a, _) = correlations.mint(client());
        let (b, _) = correlations.mint(client());
        assert_ne!(a, b);

        correlations.insert(42, Correlation::new(client()));
        assert!(correlations.correlate(42).is_some());
        assert_eq!(correlations.len(), 2);
    }
}
