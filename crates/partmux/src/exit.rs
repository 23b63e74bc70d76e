use std::fmt;
use std::io;

use partmux_frame::FrameError;
use partmux_partition::PartitionError;
use partmux_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidCapacity(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Oversized { .. } | TransportError::Empty => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Truncated { .. } | FrameError::OutOfBounds { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::NegativeCredit(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn partition_error(context: &str, err: PartitionError) -> CliError {
    match err {
        PartitionError::Transport(err) => transport_error(context, err),
        PartitionError::Frame(err) => frame_error(context, err),
        PartitionError::AcceptFailed { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        PartitionError::NegativeCredit { .. } | PartitionError::InvalidConfig(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}
