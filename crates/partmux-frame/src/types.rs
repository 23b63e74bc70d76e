//! Frame type tags.
//!
//! Tags below `0x4000_0000` travel on the streams ring (data-bearing).
//! Tags with bit 30 set travel on the throttle ring (flow control).

/// Opens a stream; carries reference, correlation and the first payload.
pub const BEGIN: u32 = 0x0000_0001;

/// Payload segment of an open stream.
pub const DATA: u32 = 0x0000_0002;

/// Graceful end of a stream.
pub const END: u32 = 0x0000_0003;

/// Abnormal termination of a stream, sent against the data direction.
pub const RESET: u32 = 0x4000_0001;

/// Credit grant, sent against the data direction.
pub const WINDOW: u32 = 0x4000_0002;

const THROTTLE_BIT: u32 = 0x4000_0000;

/// Returns a human-readable name for a type tag.
pub fn type_name(type_id: u32) -> &'static str {
    match type_id {
        BEGIN => "BEGIN",
        DATA => "DATA",
        END => "END",
        RESET => "RESET",
        WINDOW => "WINDOW",
        _ => "UNKNOWN",
    }
}

/// Returns true if frames with this tag belong on the throttle ring.
pub fn is_throttle(type_id: u32) -> bool {
    type_id & THROTTLE_BIT != 0
}
