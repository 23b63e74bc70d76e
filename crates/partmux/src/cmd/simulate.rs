use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;
use partmux_frame::{
    build_begin, build_data, build_end, build_reset, build_window, type_name, FrameView,
    WindowView, BEGIN, BEGIN_SIZE, DATA, END, RESET, WINDOW,
};
use partmux_partition::{
    AcceptFailurePolicy, ChannelAddress, ChannelConfig, ChannelObserver, ChildChannel,
    ClientChannel, Correlation, CorrelationMap, FlowControlEmitter, HandshakeFuture,
    MessageHandler, Partition, PartitionCollaborators, PartitionConfig, PartitionStats,
    PipelineError, PipelineFactory, RouteMap, ServerChannel, StreamChannel, StreamMap, Target,
    TargetSupplier,
};
use partmux_transport::{
    RingConfig, StreamsLayout, DEFAULT_STREAMS_CAPACITY, DEFAULT_THROTTLE_CAPACITY,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cmd::decode::decode_frame;
use crate::cmd::SimulateArgs;
use crate::exit::{
    frame_error, io_error, partition_error, transport_error, CliError, CliResult, DATA_INVALID,
    FAILURE, SUCCESS, USAGE,
};
use crate::output::{print_report, OutputFormat};

/// A scenario: what is bound and pending before the run, what arrives on
/// the streams ring, and what the local side does afterwards.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default = "default_partition")]
    pub partition: String,
    #[serde(default)]
    pub accept_failure: AcceptFailurePolicy,
    #[serde(default)]
    pub streams_capacity: Option<usize>,
    #[serde(default)]
    pub throttle_capacity: Option<usize>,
    #[serde(default)]
    pub routes: Vec<ScriptRoute>,
    #[serde(default)]
    pub connects: Vec<ScriptConnect>,
    #[serde(default)]
    pub frames: Vec<ScriptFrame>,
    #[serde(default)]
    pub credits: Vec<ScriptCredit>,
    #[serde(default)]
    pub retire: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptRoute {
    pub route_ref: u64,
    #[serde(default = "default_server")]
    pub name: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub duplex: bool,
    #[serde(default = "default_true")]
    pub throttle: bool,
    #[serde(default)]
    pub window: i32,
    #[serde(default)]
    pub write_partition: Option<String>,
    /// Make the server's pipeline factory fail on every accept.
    #[serde(default)]
    pub fail_pipeline: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptConnect {
    pub correlation_id: u64,
    #[serde(default = "default_remote")]
    pub remote: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum ScriptFrame {
    Begin {
        stream_id: u64,
        #[serde(default)]
        reference_id: u64,
        #[serde(default)]
        correlation_id: u64,
        #[serde(default)]
        payload: String,
    },
    Data {
        stream_id: u64,
        #[serde(default)]
        payload: String,
    },
    End {
        stream_id: u64,
    },
    Window {
        stream_id: u64,
        update: i32,
    },
    Reset {
        stream_id: u64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptCredit {
    pub stream_id: u64,
    pub update: i32,
}

fn default_partition() -> String {
    "sim".to_string()
}

fn default_server() -> String {
    "server".to_string()
}

fn default_remote() -> String {
    "peer".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub seq: usize,
    pub stream_id: u64,
    pub event: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    pub frame_type: &'static str,
    pub stream_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditRecord {
    pub stream_id: u64,
    pub update: i32,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub partition: String,
    pub accept_failure: AcceptFailurePolicy,
    pub stats: PartitionStats,
    pub events: Vec<EventRecord>,
    pub outbound: Vec<OutboundFrame>,
    pub credits: Vec<CreditRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let text = fs::read_to_string(&args.script).map_err(|err| {
        io_error(&format!("failed reading {}", args.script.display()), err)
    })?;
    let mut script: Script = serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid script {}: {err}", args.script.display()),
        )
    })?;
    if let Some(policy) = args.accept_failure {
        script.accept_failure = policy.into();
    }

    let report = simulate(&script)?;
    print_report(&report, format);

    Ok(if report.error.is_some() { FAILURE } else { SUCCESS })
}

/// Everything the scripted collaborators observed, in order.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<EventRecord>>,
    channels: Mutex<HashMap<u64, StreamChannel>>,
}

impl Recorder {
    fn record(&self, stream_id: u64, event: &'static str, detail: String) {
        let mut events = self.events.lock();
        let seq = events.len() + 1;
        events.push(EventRecord {
            seq,
            stream_id,
            event,
            detail,
        });
    }
}

struct RecordingObserver {
    recorder: Arc<Recorder>,
}

impl ChannelObserver for RecordingObserver {
    fn on_bound(&self, channel: &Arc<ChildChannel>, local: &ChannelAddress) {
        self.recorder
            .record(channel.stream().source_id(), "bound", local.to_string());
    }

    fn on_connected(&self, channel: &Arc<ChildChannel>, remote: &ChannelAddress) {
        self.recorder
            .record(channel.stream().source_id(), "connected", remote.to_string());
    }
}

struct RecordingTargets {
    recorder: Arc<Recorder>,
}

struct RecordingTarget {
    recorder: Arc<Recorder>,
    remote: String,
    partition: String,
}

impl TargetSupplier for RecordingTargets {
    fn supply_target(&self, remote_name: &str, partition_name: &str) -> Arc<dyn Target> {
        Arc::new(RecordingTarget {
            recorder: Arc::clone(&self.recorder),
            remote: remote_name.to_string(),
            partition: partition_name.to_string(),
        })
    }
}

impl Target for RecordingTarget {
    fn on_accepted(
        &self,
        channel: &Arc<ChildChannel>,
        correlation_id: u64,
        _handshake: &HandshakeFuture,
    ) {
        self.recorder.record(
            channel.stream().source_id(),
            "paired",
            format!(
                "{}/{} correlation={correlation_id}",
                self.remote, self.partition
            ),
        );
    }
}

fn describe(frame: &[u8]) -> String {
    match decode_frame(frame, 0, frame.len()) {
        Ok(decoded) => match decoded.payload {
            Some(payload) => format!("{} {payload}", decoded.frame_type),
            None => decoded.frame_type.to_string(),
        },
        Err(err) => format!("undecodable: {err}"),
    }
}

fn pipeline_for(route: &ScriptRoute, recorder: &Arc<Recorder>) -> Arc<dyn PipelineFactory> {
    if route.fail_pipeline {
        return Arc::new(
            || -> std::result::Result<Arc<dyn ChannelObserver>, PipelineError> {
                Err(PipelineError::new("pipeline refused by script"))
            },
        );
    }
    let recorder = Arc::clone(recorder);
    Arc::new(
        move || -> std::result::Result<Arc<dyn ChannelObserver>, PipelineError> {
            Ok(Arc::new(RecordingObserver {
                recorder: Arc::clone(&recorder),
            }))
        },
    )
}

fn encode(frame: &ScriptFrame) -> CliResult<(u32, Vec<u8>)> {
    let mut scratch = vec![0u8; BEGIN_SIZE + frame_payload_len(frame)];
    let (type_id, bytes) = match frame {
        ScriptFrame::Begin {
            stream_id,
            reference_id,
            correlation_id,
            payload,
        } => (
            BEGIN,
            build_begin(
                &mut scratch,
                *stream_id,
                *reference_id,
                *correlation_id,
                payload.as_bytes(),
            ),
        ),
        ScriptFrame::Data { stream_id, payload } => {
            (DATA, build_data(&mut scratch, *stream_id, payload.as_bytes()))
        }
        ScriptFrame::End { stream_id } => (END, build_end(&mut scratch, *stream_id)),
        ScriptFrame::Window { stream_id, update } => {
            (WINDOW, build_window(&mut scratch, *stream_id, *update))
        }
        ScriptFrame::Reset { stream_id } => (RESET, build_reset(&mut scratch, *stream_id)),
    };
    let bytes = bytes.map_err(|err| frame_error("encoding script frame failed", err))?;
    Ok((type_id, bytes.to_vec()))
}

fn frame_payload_len(frame: &ScriptFrame) -> usize {
    match frame {
        ScriptFrame::Begin { payload, .. } | ScriptFrame::Data { payload, .. } => payload.len(),
        _ => 0,
    }
}

/// Run `script` through one partition and collect what happened.
pub fn simulate(script: &Script) -> CliResult<SimulationReport> {
    let layout = StreamsLayout::new(RingConfig {
        streams_capacity: script.streams_capacity.unwrap_or(DEFAULT_STREAMS_CAPACITY),
        throttle_capacity: script
            .throttle_capacity
            .unwrap_or(DEFAULT_THROTTLE_CAPACITY),
    })
    .map_err(|err| transport_error("allocating rings failed", err))?;

    let recorder = Arc::new(Recorder::default());
    let routes = Arc::new(RouteMap::new());
    let correlations = Arc::new(CorrelationMap::new());

    for route in &script.routes {
        let server = ServerChannel::new(
            route.name.clone(),
            ChannelAddress::new(script.partition.clone(), route.remote.clone(), route.route_ref),
            ChannelConfig {
                duplex: route.duplex,
                throttle: route.throttle,
                read_partition: Some(script.partition.clone()),
                write_partition: route.write_partition.clone(),
                window: route.window,
                correlation: 0,
            },
            pipeline_for(route, &recorder),
        );
        routes
            .bind(Arc::new(server))
            .map_err(|err| partition_error("binding route failed", err))?;
    }

    for connect in &script.connects {
        let client = ClientChannel::new(
            ChannelAddress::new(connect.remote.clone(), script.partition.clone(), 0),
            ChannelConfig::default(),
        );
        if correlations
            .insert(connect.correlation_id, Correlation::new(Arc::new(client)))
            .is_some()
        {
            return Err(CliError::new(
                DATA_INVALID,
                format!("correlation {} listed twice", connect.correlation_id),
            ));
        }
    }

    let factory = {
        let recorder = Arc::clone(&recorder);
        move |channel: StreamChannel,
              _emitter: FlowControlEmitter,
              handshake: HandshakeFuture|
              -> Arc<dyn MessageHandler> {
            let stream_id = channel.stream().source_id();
            recorder.channels.lock().insert(stream_id, channel);

            let recorder = Arc::clone(&recorder);
            Arc::new(move |type_id: u32, frame: &[u8]| {
                recorder.record(stream_id, "deliver", describe(frame));
                if type_id == BEGIN && handshake.succeed() {
                    recorder.record(stream_id, "handshake", "completed".to_string());
                }
            })
        }
    };

    let collaborators = PartitionCollaborators {
        routes,
        streams: Arc::new(StreamMap::new()),
        correlations,
        factory: Arc::new(factory),
        targets: Arc::new(RecordingTargets {
            recorder: Arc::clone(&recorder),
        }),
    };

    let config = PartitionConfig::new(script.partition.clone())
        .with_accept_failure(script.accept_failure);
    let mut partition = Partition::new(config, layout.clone(), collaborators)
        .map_err(|err| partition_error("opening partition failed", err))?;

    for frame in &script.frames {
        let (type_id, bytes) = encode(frame)?;
        layout
            .streams()
            .write(type_id, &bytes)
            .map_err(|err| transport_error("queueing script frame failed", err))?;
    }

    let mut error = None;
    loop {
        match partition.process() {
            Ok(0) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(partition = %partition, error = %err, "simulation drain aborted");
                error = Some(err.to_string());
                break;
            }
        }
    }

    let mut credits = Vec::with_capacity(script.credits.len());
    for credit in &script.credits {
        let channel = recorder
            .channels
            .lock()
            .get(&credit.stream_id)
            .cloned()
            .ok_or_else(|| {
                CliError::new(
                    USAGE,
                    format!("credit for stream {} which was never established", credit.stream_id),
                )
            })?;
        let total = partition
            .signal_credit(channel.stream(), credit.update)
            .map_err(|err| partition_error("credit failed", err))?;
        credits.push(CreditRecord {
            stream_id: credit.stream_id,
            update: credit.update,
            total,
        });
    }

    for &stream_id in &script.retire {
        if partition.retire_stream(stream_id) {
            recorder.record(stream_id, "retired", String::new());
        }
    }

    let mut outbound = Vec::new();
    layout.throttle().read(&mut |type_id, frame| {
        let stream_id = FrameView::wrap(frame).map(|view| view.stream_id()).unwrap_or(0);
        let update = if type_id == WINDOW {
            WindowView::wrap(frame).ok().map(|view| view.update())
        } else {
            None
        };
        outbound.push(OutboundFrame {
            frame_type: type_name(type_id),
            stream_id,
            update,
        });
        ControlFlow::Continue(())
    });

    let stats = partition.close();
    info!(
        partition = %script.partition,
        drained = stats.drained,
        outbound = outbound.len(),
        "simulation finished"
    );

    let events = std::mem::take(&mut *recorder.events.lock());
    Ok(SimulationReport {
        partition: script.partition.clone(),
        accept_failure: script.accept_failure,
        stats,
        events,
        outbound,
        credits,
        error,
    })
}
