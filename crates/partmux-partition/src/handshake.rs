//! Establishes streams for frames whose stream id has no handler yet.
//!
//! An initial Begin (non-zero reference) is accepted through the route
//! table; a reply Begin (zero reference) is matched against a pending
//! active open through the correlation table. Anything else is reset.
//!
//! On success the order is fixed: register, replay the Begin into the new
//! handler, notify bound, pair a duplex target, notify connected. A handler
//! that sees its own "connected" has already consumed its opening payload.

use std::sync::Arc;

use partmux_frame::{type_name, BeginView, BEGIN};
use tracing::{debug, warn};

use crate::channel::{ChannelConfig, ChildChannel, ServerChannel, StreamChannel};
use crate::collaborators::PartitionCollaborators;
use crate::error::{PartitionError, PipelineError, Result};
use crate::future::HandshakeFuture;
use crate::handler::MessageHandler;
use crate::partition::AcceptFailurePolicy;
use crate::throttle::FlowControlEmitter;

/// What the engine did with an unrecognized frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Initial Begin accepted on a route.
    Accepted,
    /// Reply Begin matched a pending open.
    Correlated,
    /// Answered with a Reset.
    Rejected,
}

pub(crate) struct HandshakeEngine {
    collaborators: PartitionCollaborators,
    emitter: FlowControlEmitter,
    accept_failure: AcceptFailurePolicy,
}

impl HandshakeEngine {
    pub(crate) fn new(
        collaborators: PartitionCollaborators,
        emitter: FlowControlEmitter,
        accept_failure: AcceptFailurePolicy,
    ) -> Self {
        Self {
            collaborators,
            emitter,
            accept_failure,
        }
    }

    pub(crate) fn handle_unrecognized(
        &self,
        type_id: u32,
        frame: &[u8],
        stream_id: u64,
    ) -> Result<Disposition> {
        if type_id != BEGIN {
            debug!(
                stream_id,
                frame_type = type_name(type_id),
                "frame for unknown stream, resetting"
            );
            return self.reject(stream_id);
        }

        let begin = match BeginView::wrap(frame) {
            Ok(begin) => begin,
            Err(err) => {
                warn!(stream_id, error = %err, "malformed begin, resetting");
                return self.reject(stream_id);
            }
        };

        if begin.reference_id() != 0 {
            self.handle_begin_initial(type_id, begin)
        } else {
            self.handle_begin_reply(type_id, begin)
        }
    }

    fn handle_begin_initial(&self, type_id: u32, begin: BeginView<'_>) -> Result<Disposition> {
        let source_id = begin.stream_id();
        let route_ref = begin.reference_id();

        let Some(server) = self.collaborators.routes.lookup_route(route_ref) else {
            debug!(stream_id = source_id, route_ref, "no route for begin, resetting");
            return self.reject(source_id);
        };

        let correlation_id = begin.correlation_id();
        let child = match accept(&server, correlation_id) {
            Ok(child) => Arc::new(child),
            Err(source) => match self.accept_failure {
                AcceptFailurePolicy::Abort => {
                    return Err(PartitionError::AcceptFailed {
                        route_ref,
                        stream_id: source_id,
                        source,
                    });
                }
                AcceptFailurePolicy::Isolate => {
                    warn!(
                        stream_id = source_id,
                        route_ref,
                        error = %source,
                        "accept failed, resetting"
                    );
                    return self.reject(source_id);
                }
            },
        };
        child.stream().set_source_id(source_id);

        let channel = StreamChannel::Accepted(Arc::clone(&child));
        let handshake = HandshakeFuture::new(channel.clone());
        let handler =
            self.collaborators
                .factory
                .new_stream(channel, self.emitter.clone(), handshake.clone());

        if !self.install(source_id, &handler)? {
            handshake.fail(format!("stream {source_id} already registered"));
            return Ok(Disposition::Rejected);
        }
        handler.on_message(type_id, begin.as_bytes());

        child.observer().on_bound(&child, child.local_address());

        if child.config().duplex {
            let remote_name = child.remote_address().receiver();
            let partition_name = child.config().write_partition.as_deref().unwrap_or_default();
            let target = self
                .collaborators
                .targets
                .supply_target(remote_name, partition_name);
            target.on_accepted(&child, correlation_id, &handshake);
        }

        child.observer().on_connected(&child, child.remote_address());

        debug!(
            stream_id = source_id,
            route_ref,
            correlation_id,
            server = server.name(),
            "begin accepted"
        );
        Ok(Disposition::Accepted)
    }

    fn handle_begin_reply(&self, type_id: u32, begin: BeginView<'_>) -> Result<Disposition> {
        let correlation_id = begin.correlation_id();
        let source_id = begin.stream_id();

        let Some(correlation) = self.collaborators.correlations.correlate(correlation_id) else {
            debug!(
                stream_id = source_id,
                correlation_id,
                "no pending open for reply, resetting"
            );
            return self.reject(source_id);
        };

        let handshake = correlation.into_future();
        let channel = handshake.channel().clone();
        let previous_id = channel.stream().source_id();
        channel.stream().set_source_id(source_id);

        let handler =
            self.collaborators
                .factory
                .new_stream(channel.clone(), self.emitter.clone(), handshake.clone());

        if !self.install(source_id, &handler)? {
            channel.stream().set_source_id(previous_id);
            handshake.fail(format!("stream {source_id} already registered"));
            return Ok(Disposition::Rejected);
        }
        handler.on_message(type_id, begin.as_bytes());

        debug!(stream_id = source_id, correlation_id, "reply correlated");
        Ok(Disposition::Correlated)
    }

    /// Register `handler`; a stream id claimed concurrently by another
    /// partition is answered with a Reset instead.
    fn install(&self, stream_id: u64, handler: &Arc<dyn MessageHandler>) -> Result<bool> {
        match self
            .collaborators
            .streams
            .register_stream(stream_id, Arc::clone(handler))
        {
            Ok(()) => Ok(true),
            Err(PartitionError::DuplicateStream(_)) => {
                warn!(stream_id, "stream registered concurrently, resetting");
                self.emitter.signal_reset(stream_id)?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn reject(&self, stream_id: u64) -> Result<Disposition> {
        self.emitter.signal_reset(stream_id)?;
        Ok(Disposition::Rejected)
    }
}

/// Build the child a server accepts for an initial Begin.
///
/// The child inherits the server's configuration, records the correlation
/// id, and writes to the reply address's sender unless a write partition
/// was configured.
fn accept(
    server: &ServerChannel,
    correlation_id: u64,
) -> std::result::Result<ChildChannel, PipelineError> {
    let server_config = server.config();
    let observer = server.pipeline_factory().pipeline()?;

    let server_address = server.local_address();
    let remote_address = server_address.reply_to();

    let write_partition = server_config
        .write_partition
        .clone()
        .or_else(|| Some(remote_address.sender().to_string()));

    let config = ChannelConfig {
        duplex: server_config.duplex,
        throttle: server_config.throttle,
        read_partition: server_config.read_partition.clone(),
        write_partition,
        window: server_config.window,
        correlation: correlation_id,
    };

    Ok(ChildChannel::new(
        server.name(),
        server_address.clone(),
        remote_address,
        config,
        observer,
    ))
}
