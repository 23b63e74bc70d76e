/// Errors that can occur in partition operations.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] partmux_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] partmux_frame::FrameError),

    /// Building the accepted channel failed; the drain pass is aborted.
    #[error("accept on route {route_ref} for stream {stream_id} failed: {source}")]
    AcceptFailed {
        route_ref: u64,
        stream_id: u64,
        #[source]
        source: PipelineError,
    },

    /// A handler is already registered for the stream id.
    #[error("stream {0} already registered")]
    DuplicateStream(u64),

    /// A listening endpoint already owns the route reference.
    #[error("route {0} already bound")]
    DuplicateRoute(u64),

    /// Credit updates must be non-negative.
    #[error("negative credit update {update} for stream {stream_id}")]
    NegativeCredit { stream_id: u64, update: i32 },

    /// The partition configuration cannot be used.
    #[error("invalid partition config: {0}")]
    InvalidConfig(String),
}

/// Failure raised while constructing the pipeline of an accepted channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pipeline construction failed: {reason}")]
pub struct PipelineError {
    pub reason: String,
}

impl PipelineError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PartitionError>;
