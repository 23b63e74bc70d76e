//! Fixed-layout binary frames carried by partmux partitions.
//!
//! Every frame starts with the same 12-byte header:
//! - A 4-byte little-endian type tag
//! - An 8-byte little-endian stream id
//!
//! Views wrap an existing region in place and never copy. Builders write
//! into a caller-owned scratch buffer from offset 0 and return the exact
//! span written, so one scratch buffer per partition covers every frame.
//! Frames are not self-describing beyond the tag: callers pick the typed
//! view once the tag is known.

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{
    build_begin, build_data, build_end, build_reset, build_window, BeginView, DataView, FrameView,
    WindowView, BEGIN_SIZE, HEADER_SIZE, RESET_SIZE, WINDOW_SIZE,
};
pub use error::{FrameError, Result};
pub use types::{is_throttle, type_name, BEGIN, DATA, END, RESET, WINDOW};
