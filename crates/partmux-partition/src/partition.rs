use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use partmux_frame::{type_name, FrameView, WINDOW_SIZE};
use partmux_transport::StreamsLayout;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channel::StreamState;
use crate::collaborators::{PartitionCollaborators, StreamRegistry};
use crate::error::{PartitionError, Result};
use crate::handshake::{Disposition, HandshakeEngine};
use crate::throttle::FlowControlEmitter;

/// Default size of the scratch buffer outbound frames are built in.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 256;

/// What a failing accept does to the current drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptFailurePolicy {
    /// Stop draining and return the error from `process`.
    #[default]
    Abort,
    /// Reset the offending stream and keep draining.
    Isolate,
}

/// Partition configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    /// Name used in logs and `Display`.
    pub name: String,
    /// Bytes reserved for building Window and Reset frames.
    pub scratch_capacity: usize,
    pub accept_failure: AcceptFailurePolicy,
}

impl PartitionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_scratch_capacity(mut self, scratch_capacity: usize) -> Self {
        self.scratch_capacity = scratch_capacity;
        self
    }

    pub fn with_accept_failure(mut self, policy: AcceptFailurePolicy) -> Self {
        self.accept_failure = policy;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PartitionError::InvalidConfig(
                "partition name must not be empty".to_string(),
            ));
        }
        if self.scratch_capacity < WINDOW_SIZE {
            return Err(PartitionError::InvalidConfig(format!(
                "scratch capacity {} is below the {WINDOW_SIZE} byte window frame",
                self.scratch_capacity
            )));
        }
        Ok(())
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            name: "partition".to_string(),
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            accept_failure: AcceptFailurePolicy::Abort,
        }
    }
}

/// Running counters for one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    /// Entries taken off the streams ring.
    pub drained: u64,
    /// Entries delivered to an installed handler.
    pub dispatched: u64,
    /// Initial Begins accepted on a route.
    pub accepted: u64,
    /// Reply Begins matched to a pending open.
    pub correlated: u64,
    /// Entries answered with a Reset.
    pub rejected: u64,
    /// Entries too short to name a stream.
    pub dropped: u64,
}

/// Per-entry classification, split from `Partition` so the ring borrow and
/// the mutable counters stay disjoint.
struct Dispatcher {
    streams: Arc<dyn StreamRegistry>,
    engine: HandshakeEngine,
    stats: PartitionStats,
}

impl Dispatcher {
    fn classify(&mut self, partition: &str, type_id: u32, frame: &[u8]) -> Result<()> {
        self.stats.drained += 1;

        let stream_id = match FrameView::wrap(frame) {
            Ok(view) => view.stream_id(),
            Err(err) => {
                warn!(
                    partition,
                    frame_type = type_name(type_id),
                    error = %err,
                    "dropping entry without a frame header"
                );
                self.stats.dropped += 1;
                return Ok(());
            }
        };

        if let Some(handler) = self.streams.lookup_stream(stream_id) {
            handler.on_message(type_id, frame);
            self.stats.dispatched += 1;
            return Ok(());
        }

        match self.engine.handle_unrecognized(type_id, frame, stream_id)? {
            Disposition::Accepted => self.stats.accepted += 1,
            Disposition::Correlated => self.stats.correlated += 1,
            Disposition::Rejected => self.stats.rejected += 1,
        }
        Ok(())
    }
}

/// One inbound/outbound ring pair and the dispatch logic bound to it.
///
/// Exactly one caller drives [`process`](Partition::process); the shared
/// tables in [`PartitionCollaborators`] may be used by many partitions at
/// once.
pub struct Partition {
    name: Arc<str>,
    layout: StreamsLayout,
    emitter: FlowControlEmitter,
    dispatcher: Dispatcher,
}

impl Partition {
    /// Bind a partition to `layout`, borrowing the shared `collaborators`.
    pub fn new(
        config: PartitionConfig,
        layout: StreamsLayout,
        collaborators: PartitionCollaborators,
    ) -> Result<Self> {
        config.validate()?;

        let name: Arc<str> = Arc::from(config.name);
        let emitter = FlowControlEmitter::new(
            Arc::clone(&name),
            Arc::clone(layout.throttle()),
            config.scratch_capacity,
        );
        let dispatcher = Dispatcher {
            streams: Arc::clone(&collaborators.streams),
            engine: HandshakeEngine::new(collaborators, emitter.clone(), config.accept_failure),
            stats: PartitionStats::default(),
        };

        info!(
            partition = %name,
            streams_capacity = layout.streams().capacity(),
            throttle_capacity = layout.throttle().capacity(),
            accept_failure = ?config.accept_failure,
            "partition opened"
        );

        Ok(Self {
            name,
            layout,
            emitter,
            dispatcher,
        })
    }

    /// Drain every entry currently on the streams ring.
    ///
    /// Returns the number of entries consumed; 0 when the ring is empty.
    /// With [`AcceptFailurePolicy::Abort`] a failing accept ends the pass
    /// early and is returned. Entries after it stay on the ring for the
    /// next call.
    pub fn process(&mut self) -> Result<usize> {
        let name = &*self.name;
        let dispatcher = &mut self.dispatcher;
        let mut failure = None;

        let drained = self.layout.streams().read(&mut |type_id, frame| {
            match dispatcher.classify(name, type_id, frame) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        });

        match failure {
            Some(err) => {
                warn!(partition = name, drained, error = %err, "drain pass aborted");
                Err(err)
            }
            None => Ok(drained),
        }
    }

    /// Grant `update` bytes of credit to the sender of `owner`'s stream.
    /// Returns the owner's new cumulative total.
    pub fn signal_credit(&self, owner: &StreamState, update: i32) -> Result<i64> {
        self.emitter.signal_credit(owner, update)
    }

    /// Abnormally terminate `stream_id` towards its sender.
    pub fn signal_reset(&self, stream_id: u64) -> Result<()> {
        self.emitter.signal_reset(stream_id)
    }

    /// Drop `stream_id` from the stream registry. Later frames for it take
    /// the handshake path again.
    pub fn retire_stream(&self, stream_id: u64) -> bool {
        let retired = self
            .dispatcher
            .streams
            .unregister_stream(stream_id)
            .is_some();
        if retired {
            info!(partition = %self.name, stream_id, "stream retired");
        }
        retired
    }

    /// Emitter shared with every handler this partition creates.
    pub fn emitter(&self) -> &FlowControlEmitter {
        &self.emitter
    }

    pub fn stats(&self) -> PartitionStats {
        self.dispatcher.stats
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &StreamsLayout {
        &self.layout
    }

    /// Release the storage region. Stop calling `process` first.
    pub fn close(self) -> PartitionStats {
        self.layout.close();
        let stats = self.dispatcher.stats;
        info!(
            partition = %self.name,
            drained = stats.drained,
            rejected = stats.rejected,
            "partition closed"
        );
        stats
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Partition [{}]", self.name)
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("name", &self.name)
            .field("stats", &self.dispatcher.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use partmux_frame::{
        build_begin, build_data, build_window, WindowView, BEGIN, DATA, RESET, WINDOW,
    };
    use partmux_transport::RingConfig;

    use super::*;
    use crate::channel::{
        ChannelAddress, ChannelConfig, ChannelObserver, ChildChannel, ClientChannel,
        ServerChannel, StreamChannel,
    };
    use crate::collaborators::{Target, TargetSupplier};
    use crate::error::PipelineError;
    use crate::future::{HandshakeFuture, HandshakeOutcome};
    use crate::handler::MessageHandler;
    use crate::tables::{CorrelationMap, RouteMap, StreamMap};

    type Events = Arc<Mutex<Vec<String>>>;

    /// Stream map that records registrations. A blind map never reports a
    /// hit, so every frame reaches the handshake path.
    struct RecordingStreams {
        inner: StreamMap,
        events: Events,
        blind: bool,
    }

    impl StreamRegistry for RecordingStreams {
        fn lookup_stream(&self, stream_id: u64) -> Option<Arc<dyn MessageHandler>> {
            if self.blind {
                return None;
            }
            self.inner.lookup_stream(stream_id)
        }

        fn register_stream(&self, stream_id: u64, handler: Arc<dyn MessageHandler>) -> Result<()> {
            self.inner.register_stream(stream_id, handler)?;
            self.events.lock().push(format!("register:{stream_id}"));
            Ok(())
        }

        fn unregister_stream(&self, stream_id: u64) -> Option<Arc<dyn MessageHandler>> {
            self.inner.unregister_stream(stream_id)
        }
    }

    struct RecordingObserver {
        events: Events,
    }

    impl ChannelObserver for RecordingObserver {
        fn on_bound(&self, _channel: &Arc<ChildChannel>, _local: &ChannelAddress) {
            self.events.lock().push("bound".to_string());
        }

        fn on_connected(&self, _channel: &Arc<ChildChannel>, _remote: &ChannelAddress) {
            self.events.lock().push("connected".to_string());
        }
    }

    struct RecordingTargets {
        events: Events,
    }

    struct RecordingTarget {
        events: Events,
    }

    impl TargetSupplier for RecordingTargets {
        fn supply_target(&self, remote_name: &str, partition_name: &str) -> Arc<dyn Target> {
            self.events
                .lock()
                .push(format!("supply:{remote_name}:{partition_name}"));
            Arc::new(RecordingTarget {
                events: Arc::clone(&self.events),
            })
        }
    }

    impl Target for RecordingTarget {
        fn on_accepted(
            &self,
            _channel: &Arc<ChildChannel>,
            correlation_id: u64,
            handshake: &HandshakeFuture,
        ) {
            self.events.lock().push(format!("accepted:{correlation_id}"));
            handshake.succeed();
        }
    }

    struct Fixture {
        partition: Partition,
        layout: StreamsLayout,
        routes: Arc<RouteMap>,
        streams: Arc<RecordingStreams>,
        correlations: Arc<CorrelationMap>,
        events: Events,
        channels: Arc<Mutex<Vec<StreamChannel>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::build(PartitionConfig::new("test"), false)
        }

        fn build(config: PartitionConfig, blind: bool) -> Self {
            let events: Events = Arc::default();
            let channels: Arc<Mutex<Vec<StreamChannel>>> = Arc::default();
            let layout = StreamsLayout::new(RingConfig::default()).unwrap();

            let routes = Arc::new(RouteMap::new());
            let streams = Arc::new(RecordingStreams {
                inner: StreamMap::new(),
                events: Arc::clone(&events),
                blind,
            });
            let correlations = Arc::new(CorrelationMap::new());

            let factory_events = Arc::clone(&events);
            let factory_channels = Arc::clone(&channels);
            let factory = move |channel: StreamChannel,
                                _emitter: FlowControlEmitter,
                                _handshake: HandshakeFuture|
                  -> Arc<dyn MessageHandler> {
                factory_channels.lock().push(channel);
                let events = Arc::clone(&factory_events);
                Arc::new(move |type_id: u32, frame: &[u8]| {
                    let stream_id = FrameView::wrap(frame).unwrap().stream_id();
                    events
                        .lock()
                        .push(format!("{}:{stream_id}", type_name(type_id)));
                })
            };

            let collaborators = PartitionCollaborators {
                routes: routes.clone(),
                streams: streams.clone(),
                correlations: correlations.clone(),
                factory: Arc::new(factory),
                targets: Arc::new(RecordingTargets {
                    events: Arc::clone(&events),
                }),
            };

            let partition = Partition::new(config, layout.clone(), collaborators).unwrap();
            Self {
                partition,
                layout,
                routes,
                streams,
                correlations,
                events,
                channels,
            }
        }

        fn bind(&self, route_ref: u64, config: ChannelConfig) {
            let events = Arc::clone(&self.events);
            let pipeline = move || -> std::result::Result<Arc<dyn ChannelObserver>, PipelineError> {
                Ok(Arc::new(RecordingObserver {
                    events: Arc::clone(&events),
                }))
            };
            let server = ServerChannel::new(
                format!("server-{route_ref}"),
                ChannelAddress::new("target", "source", route_ref),
                config,
                Arc::new(pipeline),
            );
            self.routes.bind(Arc::new(server)).unwrap();
        }

        fn bind_failing(&self, route_ref: u64) {
            let pipeline = || -> std::result::Result<Arc<dyn ChannelObserver>, PipelineError> {
                Err(PipelineError::new("observer allocation failed"))
            };
            let server = ServerChannel::new(
                "failing",
                ChannelAddress::new("target", "source", route_ref),
                ChannelConfig::default(),
                Arc::new(pipeline),
            );
            self.routes.bind(Arc::new(server)).unwrap();
        }

        fn send_begin(&self, stream_id: u64, reference_id: u64, correlation_id: u64) {
            let mut scratch = [0u8; 64];
            let frame = build_begin(&mut scratch, stream_id, reference_id, correlation_id, b"hi")
                .unwrap();
            self.layout.streams().write(BEGIN, frame).unwrap();
        }

        fn send_data(&self, stream_id: u64) {
            let mut scratch = [0u8; 64];
            let frame = build_data(&mut scratch, stream_id, b"payload").unwrap();
            self.layout.streams().write(DATA, frame).unwrap();
        }

        fn send_window(&self, stream_id: u64, update: i32) {
            let mut scratch = [0u8; 64];
            let frame = build_window(&mut scratch, stream_id, update).unwrap();
            self.layout.streams().write(WINDOW, frame).unwrap();
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        fn throttle(&self) -> Vec<(u32, u64, Option<i32>)> {
            let mut out = Vec::new();
            self.layout.throttle().read(&mut |type_id, frame| {
                let stream_id = FrameView::wrap(frame).unwrap().stream_id();
                let update =
                    (type_id == WINDOW).then(|| WindowView::wrap(frame).unwrap().update());
                out.push((type_id, stream_id, update));
                ControlFlow::Continue(())
            });
            out
        }
    }

    #[test]
    fn begin_on_known_route_registers_and_replays() {
        let mut fx = Fixture::new();
        fx.bind(7, ChannelConfig::default());
        fx.send_begin(1, 7, 42);

        assert_eq!(fx.partition.process().unwrap(), 1);
        assert_eq!(
            fx.events(),
            vec!["register:1", "BEGIN:1", "bound", "connected"]
        );
        assert!(fx.throttle().is_empty());

        let stats = fx.partition.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 0);

        let channels = fx.channels.lock();
        let StreamChannel::Accepted(child) = &channels[0] else {
            panic!("expected accepted channel");
        };
        assert_eq!(child.stream().source_id(), 1);
        assert_eq!(child.config().correlation, 42);
        assert!(child.is_write_closed());
    }

    #[test]
    fn duplex_accept_pairs_target_between_bound_and_connected() {
        let mut fx = Fixture::new();
        fx.bind(
            7,
            ChannelConfig {
                duplex: true,
                ..ChannelConfig::default()
            },
        );
        fx.send_begin(1, 7, 42);
        fx.partition.process().unwrap();

        assert_eq!(
            fx.events(),
            vec![
                "register:1",
                "BEGIN:1",
                "bound",
                "supply:source:target",
                "accepted:42",
                "connected"
            ]
        );
    }

    #[test]
    fn begin_on_unknown_route_resets_initiator() {
        let mut fx = Fixture::new();
        fx.send_begin(2, 9, 0);

        assert_eq!(fx.partition.process().unwrap(), 1);
        assert_eq!(fx.throttle(), vec![(RESET, 2, None)]);
        assert!(fx.events().is_empty());
        assert!(fx.streams.inner.is_empty());
    }

    #[test]
    fn non_begin_for_unknown_stream_resets() {
        let mut fx = Fixture::new();
        fx.send_window(5, 64);
        fx.send_data(6);

        assert_eq!(fx.partition.process().unwrap(), 2);
        assert_eq!(fx.throttle(), vec![(RESET, 5, None), (RESET, 6, None)]);
        assert!(fx.streams.inner.is_empty());
        assert_eq!(fx.partition.stats().rejected, 2);
    }

    #[test]
    fn registered_stream_takes_fast_path() {
        let mut fx = Fixture::new();
        fx.bind(7, ChannelConfig::default());
        fx.send_begin(1, 7, 42);
        fx.send_data(1);
        fx.send_begin(1, 7, 43);

        assert_eq!(fx.partition.process().unwrap(), 3);
        assert_eq!(
            fx.events(),
            vec![
                "register:1",
                "BEGIN:1",
                "bound",
                "connected",
                "DATA:1",
                "BEGIN:1"
            ]
        );
        let stats = fx.partition.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.dispatched, 2);
        assert!(fx.throttle().is_empty());
    }

    #[test]
    fn reply_begin_correlates_once() {
        let mut fx = Fixture::new();
        let client = Arc::new(ClientChannel::new(
            ChannelAddress::new("source", "target", 7),
            ChannelConfig::default(),
        ));
        let (correlation_id, handshake) = fx.correlations.mint(Arc::clone(&client));

        fx.send_begin(11, 0, correlation_id);
        fx.send_begin(12, 0, correlation_id);
        assert_eq!(fx.partition.process().unwrap(), 2);

        assert_eq!(fx.events(), vec!["register:11", "BEGIN:11"]);
        assert_eq!(client.stream().source_id(), 11);
        assert!(fx.correlations.is_empty());
        assert!(!handshake.is_done());
        assert_eq!(fx.throttle(), vec![(RESET, 12, None)]);

        let stats = fx.partition.stats();
        assert_eq!(stats.correlated, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn unmatched_reply_resets() {
        let mut fx = Fixture::new();
        fx.send_begin(4, 0, 99);

        fx.partition.process().unwrap();
        assert_eq!(fx.throttle(), vec![(RESET, 4, None)]);
        assert!(fx.events().is_empty());
    }

    #[test]
    fn accept_failure_aborts_pass_by_default() {
        let mut fx = Fixture::new();
        fx.bind_failing(8);
        fx.bind(7, ChannelConfig::default());
        fx.send_begin(1, 8, 0);
        fx.send_begin(2, 7, 0);

        let err = fx.partition.process().unwrap_err();
        assert!(matches!(
            err,
            PartitionError::AcceptFailed {
                route_ref: 8,
                stream_id: 1,
                ..
            }
        ));
        assert!(fx.throttle().is_empty());

        // The frame after the failure is still queued.
        assert_eq!(fx.partition.process().unwrap(), 1);
        assert_eq!(fx.partition.stats().accepted, 1);
    }

    #[test]
    fn accept_failure_isolated_resets_and_continues() {
        let config =
            PartitionConfig::new("isolated").with_accept_failure(AcceptFailurePolicy::Isolate);
        let mut fx = Fixture::build(config, false);
        fx.bind_failing(8);
        fx.bind(7, ChannelConfig::default());
        fx.send_begin(1, 8, 0);
        fx.send_begin(2, 7, 0);

        assert_eq!(fx.partition.process().unwrap(), 2);
        assert_eq!(fx.throttle(), vec![(RESET, 1, None)]);
        let stats = fx.partition.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.accepted, 1);
    }

    #[test]
    fn truncated_begin_is_reset() {
        let mut fx = Fixture::new();
        fx.bind(7, ChannelConfig::default());

        let mut scratch = [0u8; 64];
        let full = build_begin(&mut scratch, 3, 7, 0, b"").unwrap();
        fx.layout.streams().write(BEGIN, &full[..14]).unwrap();

        fx.partition.process().unwrap();
        assert_eq!(fx.throttle(), vec![(RESET, 3, None)]);
        assert!(fx.events().is_empty());
    }

    #[test]
    fn entry_without_header_is_dropped() {
        let mut fx = Fixture::new();
        fx.layout.streams().write(DATA, &[1, 2, 3, 4]).unwrap();

        assert_eq!(fx.partition.process().unwrap(), 1);
        assert!(fx.throttle().is_empty());
        assert_eq!(fx.partition.stats().dropped, 1);
    }

    #[test]
    fn lost_registration_race_resets_and_continues() {
        let mut fx = Fixture::build(PartitionConfig::new("racing"), true);
        fx.bind(7, ChannelConfig::default());
        fx.streams
            .inner
            .register_stream(1, Arc::new(|_: u32, _: &[u8]| {}))
            .unwrap();

        fx.send_begin(1, 7, 0);
        fx.send_begin(2, 7, 0);
        assert_eq!(fx.partition.process().unwrap(), 2);

        assert_eq!(fx.throttle(), vec![(RESET, 1, None)]);
        assert_eq!(
            fx.events(),
            vec!["register:2", "BEGIN:2", "bound", "connected"]
        );
    }

    #[test]
    fn reply_losing_registration_race_fails_the_open() {
        let mut fx = Fixture::build(PartitionConfig::new("racing"), true);
        fx.streams
            .inner
            .register_stream(11, Arc::new(|_: u32, _: &[u8]| {}))
            .unwrap();
        let client = Arc::new(ClientChannel::new(
            ChannelAddress::new("source", "target", 7),
            ChannelConfig::default(),
        ));
        let (correlation_id, handshake) = fx.correlations.mint(Arc::clone(&client));

        fx.send_begin(11, 0, correlation_id);
        assert_eq!(fx.partition.process().unwrap(), 1);

        assert_eq!(fx.throttle(), vec![(RESET, 11, None)]);
        assert!(fx.events().is_empty());
        assert_eq!(client.stream().source_id(), 0);
        assert!(matches!(
            handshake.outcome(),
            Some(HandshakeOutcome::Failed(reason)) if reason.contains("11")
        ));
        assert_eq!(fx.partition.stats().rejected, 1);
    }

    #[test]
    fn accept_losing_registration_race_fails_its_handshake() {
        let mut fx = Fixture::build(PartitionConfig::new("racing"), true);
        fx.bind(7, ChannelConfig::default());
        fx.streams
            .inner
            .register_stream(1, Arc::new(|_: u32, _: &[u8]| {}))
            .unwrap();

        let handshakes: Arc<Mutex<Vec<HandshakeFuture>>> = Arc::default();
        let captured = Arc::clone(&handshakes);
        let factory = move |_: StreamChannel,
                            _: FlowControlEmitter,
                            handshake: HandshakeFuture|
              -> Arc<dyn MessageHandler> {
            captured.lock().push(handshake);
            Arc::new(|_: u32, _: &[u8]| {})
        };
        fx.partition = Partition::new(
            PartitionConfig::new("racing"),
            fx.layout.clone(),
            PartitionCollaborators {
                routes: fx.routes.clone(),
                streams: fx.streams.clone(),
                correlations: fx.correlations.clone(),
                factory: Arc::new(factory),
                targets: Arc::new(RecordingTargets {
                    events: Arc::clone(&fx.events),
                }),
            },
        )
        .unwrap();

        fx.send_begin(1, 7, 0);
        fx.partition.process().unwrap();

        let handshakes = handshakes.lock();
        assert_eq!(handshakes.len(), 1);
        assert!(handshakes[0].is_done());
        assert!(!handshakes[0].is_success());
    }

    #[test]
    fn handler_writes_to_streams_ring_are_drained_next_pass() {
        let mut fx = Fixture::new();
        fx.bind(7, ChannelConfig::default());

        let streams_ring = Arc::clone(fx.layout.streams());
        let events = Arc::clone(&fx.events);
        let factory = move |_: StreamChannel,
                            _: FlowControlEmitter,
                            _: HandshakeFuture|
              -> Arc<dyn MessageHandler> {
            let ring = Arc::clone(&streams_ring);
            let events = Arc::clone(&events);
            Arc::new(move |type_id: u32, frame: &[u8]| {
                let stream_id = FrameView::wrap(frame).unwrap().stream_id();
                events
                    .lock()
                    .push(format!("{}:{stream_id}", type_name(type_id)));
                if type_id == BEGIN {
                    let mut scratch = [0u8; 32];
                    let echo = build_data(&mut scratch, stream_id, b"echo").unwrap();
                    ring.write(DATA, echo).unwrap();
                }
            })
        };
        fx.partition = Partition::new(
            PartitionConfig::new("echo"),
            fx.layout.clone(),
            PartitionCollaborators {
                routes: fx.routes.clone(),
                streams: fx.streams.clone(),
                correlations: fx.correlations.clone(),
                factory: Arc::new(factory),
                targets: Arc::new(RecordingTargets {
                    events: Arc::clone(&fx.events),
                }),
            },
        )
        .unwrap();

        fx.send_begin(1, 7, 0);
        assert_eq!(fx.partition.process().unwrap(), 1);
        assert!(!fx.events().contains(&"DATA:1".to_string()));

        assert_eq!(fx.partition.process().unwrap(), 1);
        assert_eq!(fx.events().last().map(String::as_str), Some("DATA:1"));
        assert_eq!(fx.partition.stats().dispatched, 1);
        assert!(fx.throttle().is_empty());
    }

    #[test]
    fn credit_accumulates_on_the_stream_owner() {
        let mut fx = Fixture::new();
        fx.bind(7, ChannelConfig::default());
        fx.send_begin(3, 7, 0);
        fx.partition.process().unwrap();

        let channel = fx.channels.lock()[0].clone();
        assert_eq!(fx.partition.signal_credit(channel.stream(), 128).unwrap(), 128);
        assert_eq!(fx.partition.signal_credit(channel.stream(), 32).unwrap(), 160);
        assert!(fx.partition.signal_credit(channel.stream(), -1).is_err());

        assert_eq!(
            fx.throttle(),
            vec![(WINDOW, 3, Some(128)), (WINDOW, 3, Some(32))]
        );
        assert_eq!(channel.stream().source_window(), 160);
    }

    #[test]
    fn retired_stream_is_reset_on_next_frame() {
        let mut fx = Fixture::new();
        fx.bind(7, ChannelConfig::default());
        fx.send_begin(1, 7, 0);
        fx.partition.process().unwrap();

        assert!(fx.partition.retire_stream(1));
        assert!(!fx.partition.retire_stream(1));

        fx.send_data(1);
        fx.partition.process().unwrap();
        assert_eq!(fx.throttle(), vec![(RESET, 1, None)]);
    }

    #[test]
    fn empty_ring_drains_nothing() {
        let mut fx = Fixture::new();
        assert_eq!(fx.partition.process().unwrap(), 0);
        assert_eq!(fx.partition.stats(), PartitionStats::default());
    }

    #[test]
    fn display_and_close() {
        let fx = Fixture::new();
        assert_eq!(fx.partition.to_string(), "Partition [test]");
        assert_eq!(fx.partition.name(), "test");

        let layout = fx.layout.clone();
        let stats = fx.partition.close();
        assert_eq!(stats.drained, 0);
        assert!(layout.is_closed());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let fx = Fixture::new();
        let collaborators = PartitionCollaborators {
            routes: fx.routes.clone(),
            streams: fx.streams.clone(),
            correlations: fx.correlations.clone(),
            factory: Arc::new(
                |_: StreamChannel,
                 _: FlowControlEmitter,
                 _: HandshakeFuture|
                 -> Arc<dyn MessageHandler> { Arc::new(|_: u32, _: &[u8]| {}) },
            ),
            targets: Arc::new(RecordingTargets {
                events: Arc::default(),
            }),
        };

        let small = PartitionConfig::new("small").with_scratch_capacity(8);
        assert!(matches!(
            Partition::new(small, fx.layout.clone(), collaborators.clone()),
            Err(PartitionError::InvalidConfig(_))
        ));

        let unnamed = PartitionConfig::new("");
        assert!(matches!(
            Partition::new(unnamed, fx.layout.clone(), collaborators),
            Err(PartitionError::InvalidConfig(_))
        ));
    }
}
