/// Errors that can occur while wrapping or building frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The region is shorter than the fixed layout of the frame type.
    #[error("truncated {kind} frame ({have} bytes, need at least {need})")]
    Truncated {
        kind: &'static str,
        need: usize,
        have: usize,
    },

    /// The offset/length window does not fit inside the buffer.
    #[error("frame window {offset}+{length} exceeds buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },

    /// The scratch buffer cannot hold the frame being built.
    #[error("scratch buffer too small ({have} bytes, need {need})")]
    ScratchTooSmall { need: usize, have: usize },

    /// Window credit must be non-negative.
    #[error("negative credit update {0}")]
    NegativeCredit(i32),
}

pub type Result<T> = std::result::Result<T, FrameError>;
