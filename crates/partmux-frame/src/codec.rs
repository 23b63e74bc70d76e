use bytes::{Buf, BufMut};

use crate::error::{FrameError, Result};
use crate::types::{BEGIN, DATA, END, RESET, WINDOW};

/// Frame header: type id (4) + stream id (8) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Begin fixed layout: header + reference id (8) + correlation id (8).
pub const BEGIN_SIZE: usize = HEADER_SIZE + 16;

/// Window fixed layout: header + credit update (4).
pub const WINDOW_SIZE: usize = HEADER_SIZE + 4;

/// Reset fixed layout: header only.
pub const RESET_SIZE: usize = HEADER_SIZE;

const TYPE_ID_OFFSET: usize = 0;
const STREAM_ID_OFFSET: usize = 4;
const REFERENCE_ID_OFFSET: usize = HEADER_SIZE;
const CORRELATION_ID_OFFSET: usize = HEADER_SIZE + 8;
const UPDATE_OFFSET: usize = HEADER_SIZE;

/// Generic view over any frame: type tag and stream id.
///
/// Wire format (little-endian):
/// ```text
/// ┌──────────────┬──────────────────┬──────────────────────┐
/// │ Type (4B)    │ Stream id (8B)   │ Type-specific ...    │
/// └──────────────┴──────────────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    buf: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap a region holding exactly one frame.
    pub fn wrap(buf: &'a [u8]) -> Result<Self> {
        check_len("generic", buf, HEADER_SIZE)?;
        Ok(Self { buf })
    }

    /// Wrap the `offset..offset + length` window of a larger buffer.
    pub fn wrap_at(buf: &'a [u8], offset: usize, length: usize) -> Result<Self> {
        Self::wrap(window(buf, offset, length)?)
    }

    pub fn type_id(&self) -> u32 {
        read_u32(self.buf, TYPE_ID_OFFSET)
    }

    pub fn stream_id(&self) -> u64 {
        read_u64(self.buf, STREAM_ID_OFFSET)
    }

    /// The wrapped region.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Size of the wrapped region in bytes.
    pub fn sizeof(&self) -> usize {
        self.buf.len()
    }
}

/// View over a Begin frame.
///
/// ```text
/// ┌──────────┬────────────────┬──────────────────┬──────────────────┐
/// │ Header   │ Reference (8B) │ Correlation (8B) │ First payload ...│
/// └──────────┴────────────────┴──────────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BeginView<'a> {
    buf: &'a [u8],
}

impl<'a> BeginView<'a> {
    pub fn wrap(buf: &'a [u8]) -> Result<Self> {
        check_len("begin", buf, BEGIN_SIZE)?;
        Ok(Self { buf })
    }

    pub fn wrap_at(buf: &'a [u8], offset: usize, length: usize) -> Result<Self> {
        Self::wrap(window(buf, offset, length)?)
    }

    pub fn type_id(&self) -> u32 {
        read_u32(self.buf, TYPE_ID_OFFSET)
    }

    pub fn stream_id(&self) -> u64 {
        read_u64(self.buf, STREAM_ID_OFFSET)
    }

    /// Route reference of the listening endpoint; 0 marks a reply.
    pub fn reference_id(&self) -> u64 {
        read_u64(self.buf, REFERENCE_ID_OFFSET)
    }

    /// Token chosen by the active opener and echoed by the reply.
    pub fn correlation_id(&self) -> u64 {
        read_u64(self.buf, CORRELATION_ID_OFFSET)
    }

    /// Whether this Begin answers an earlier active open.
    pub fn is_reply(&self) -> bool {
        self.reference_id() == 0
    }

    /// First payload segment inlined in the Begin.
    pub fn extension(&self) -> &'a [u8] {
        &self.buf[BEGIN_SIZE..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn sizeof(&self) -> usize {
        self.buf.len()
    }
}

/// View over a Data frame: header followed by the payload.
#[derive(Debug, Clone, Copy)]
pub struct DataView<'a> {
    buf: &'a [u8],
}

impl<'a> DataView<'a> {
    pub fn wrap(buf: &'a [u8]) -> Result<Self> {
        check_len("data", buf, HEADER_SIZE)?;
        Ok(Self { buf })
    }

    pub fn stream_id(&self) -> u64 {
        read_u64(self.buf, STREAM_ID_OFFSET)
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buf[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }
}

/// View over a Window frame.
#[derive(Debug, Clone, Copy)]
pub struct WindowView<'a> {
    buf: &'a [u8],
}

impl<'a> WindowView<'a> {
    pub fn wrap(buf: &'a [u8]) -> Result<Self> {
        check_len("window", buf, WINDOW_SIZE)?;
        Ok(Self { buf })
    }

    pub fn stream_id(&self) -> u64 {
        read_u64(self.buf, STREAM_ID_OFFSET)
    }

    /// Additional bytes the stream owner may now send.
    pub fn update(&self) -> i32 {
        (&self.buf[UPDATE_OFFSET..]).get_i32_le()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }
}

/// Build a Begin frame into `scratch`, returning the written span.
pub fn build_begin<'s>(
    scratch: &'s mut [u8],
    stream_id: u64,
    reference_id: u64,
    correlation_id: u64,
    extension: &[u8],
) -> Result<&'s [u8]> {
    let size = BEGIN_SIZE + extension.len();
    check_scratch(scratch, size)?;

    let mut dst = &mut scratch[..size];
    put_header(&mut dst, BEGIN, stream_id);
    dst.put_u64_le(reference_id);
    dst.put_u64_le(correlation_id);
    dst.put_slice(extension);

    Ok(&scratch[..size])
}

/// Build a Data frame into `scratch`.
pub fn build_data<'s>(scratch: &'s mut [u8], stream_id: u64, payload: &[u8]) -> Result<&'s [u8]> {
    let size = HEADER_SIZE + payload.len();
    check_scratch(scratch, size)?;

    let mut dst = &mut scratch[..size];
    put_header(&mut dst, DATA, stream_id);
    dst.put_slice(payload);

    Ok(&scratch[..size])
}

/// Build an End frame into `scratch`.
pub fn build_end(scratch: &mut [u8], stream_id: u64) -> Result<&[u8]> {
    build_header_only(scratch, END, stream_id)
}

/// Build a Window frame into `scratch`. Negative updates are refused.
pub fn build_window(scratch: &mut [u8], stream_id: u64, update: i32) -> Result<&[u8]> {
    if update < 0 {
        return Err(FrameError::NegativeCredit(update));
    }
    check_scratch(scratch, WINDOW_SIZE)?;

    let mut dst = &mut scratch[..WINDOW_SIZE];
    put_header(&mut dst, WINDOW, stream_id);
    dst.put_i32_le(update);

    Ok(&scratch[..WINDOW_SIZE])
}

/// Build a Reset frame into `scratch`.
pub fn build_reset(scratch: &mut [u8], stream_id: u64) -> Result<&[u8]> {
    build_header_only(scratch, RESET, stream_id)
}

fn build_header_only(scratch: &mut [u8], type_id: u32, stream_id: u64) -> Result<&[u8]> {
    check_scratch(scratch, HEADER_SIZE)?;

    let mut dst = &mut scratch[..HEADER_SIZE];
    put_header(&mut dst, type_id, stream_id);

    Ok(&scratch[..HEADER_SIZE])
}

fn put_header(dst: &mut &mut [u8], type_id: u32, stream_id: u64) {
    dst.put_u32_le(type_id);
    dst.put_u64_le(stream_id);
}

fn check_len(kind: &'static str, buf: &[u8], need: usize) -> Result<()> {
    if buf.len() < need {
        return Err(FrameError::Truncated {
            kind,
            need,
            have: buf.len(),
        });
    }
    Ok(())
}

fn check_scratch(scratch: &[u8], need: usize) -> Result<()> {
    if scratch.len() < need {
        return Err(FrameError::ScratchTooSmall {
            need,
            have: scratch.len(),
        });
    }
    Ok(())
}

fn window(buf: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    offset
        .checked_add(length)
        .and_then(|end| buf.get(offset..end))
        .ok_or(FrameError::OutOfBounds {
            offset,
            length,
            capacity: buf.len(),
        })
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    (&buf[offset..]).get_u32_le()
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    (&buf[offset..]).get_u64_le()
}
