//! Fixed-width ASCII decimal framing shared by the record header, the
//! per-record size field, and child/root offsets embedded in a node body.
//!
//! Everything in this file is 19-digit, zero-padded decimal: large enough
//! that no real file or node body will ever overflow it, small enough to
//! stay a constant-width, equality-comparable field.

pub(crate) const FIELD_WIDTH: usize = 19;

/// The largest value `FIELD_WIDTH` decimal digits can represent.
pub(crate) fn max_field_value() -> u128 {
    10u128.pow(FIELD_WIDTH as u32) - 1
}

pub(crate) fn encode_field(value: u64) -> [u8; FIELD_WIDTH] {
    let rendered = format!("{:0width$}", value, width = FIELD_WIDTH);
    let mut out = [0u8; FIELD_WIDTH];
    out.copy_from_slice(rendered.as_bytes());
    out
}

pub(crate) fn decode_field(bytes: &[u8]) -> Option<u64> {
    if bytes.len() != FIELD_WIDTH {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

pub(crate) fn encode_offset_string(value: u64) -> String {
    format!("{:0width$}", value, width = FIELD_WIDTH)
}

pub(crate) fn decode_offset_string(value: &str) -> Option<u64> {
    if value.len() != FIELD_WIDTH {
        return None;
    }
    value.parse().ok()
}
