use std::fs;

use partmux_frame::{
    type_name, BeginView, DataView, FrameView, WindowView, BEGIN, DATA, WINDOW,
};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{payload_preview, print_decoded, OutputFormat};

#[derive(Debug, Serialize)]
pub struct DecodedFrame {
    pub frame_type: &'static str,
    pub type_id: u32,
    pub stream_id: u64,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let length = args
        .length
        .unwrap_or_else(|| bytes.len().saturating_sub(args.offset));

    let decoded = decode_frame(&bytes, args.offset, length)
        .map_err(|err| frame_error("decode failed", err))?;
    print_decoded(&decoded, format);
    Ok(SUCCESS)
}

/// Decode the frame in `buf[offset..offset + length]`, dispatching on its
/// leading type tag.
pub fn decode_frame(
    buf: &[u8],
    offset: usize,
    length: usize,
) -> partmux_frame::Result<DecodedFrame> {
    let frame = FrameView::wrap_at(buf, offset, length)?;
    let type_id = frame.type_id();
    let mut decoded = DecodedFrame {
        frame_type: type_name(type_id),
        type_id,
        stream_id: frame.stream_id(),
        size: frame.sizeof(),
        reference_id: None,
        correlation_id: None,
        update: None,
        payload: None,
    };

    match type_id {
        BEGIN => {
            let begin = BeginView::wrap(frame.as_bytes())?;
            decoded.reference_id = Some(begin.reference_id());
            decoded.correlation_id = Some(begin.correlation_id());
            if !begin.extension().is_empty() {
                decoded.payload = Some(payload_preview(begin.extension()));
            }
        }
        DATA => {
            let data = DataView::wrap(frame.as_bytes())?;
            decoded.payload = Some(payload_preview(data.payload()));
        }
        WINDOW => {
            decoded.update = Some(WindowView::wrap(frame.as_bytes())?.update());
        }
        _ => {}
    }

    Ok(decoded)
}
