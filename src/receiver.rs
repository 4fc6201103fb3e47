//! Receiver module - inbound half of the frame codec
//!
//! The modem reports two kinds of lines:
//!
//! ```text
//! RECVIM,<f1>,<src>,<dest>,<f4>,<f5>,<f6>,<f7>,<f8>,<RTS|CTS|INFO;data>
//! DELIVERED,<dest>
//! ```
//!
//! Anything else is noise from the shared link and is reported as
//! [`DacapError::MalformedFrame`].

use crate::contracts::{Frame, MessageKind, NodeAddress};
use crate::errors::{DacapError, Result};
use crate::transmitter::{truncate_utf8, INFO_PREFIX};

const RECVIM_TAG: &str = "RECVIM";
const DELIVERED_TAG: &str = "DELIVERED";

/// Minimum number of fields in a RECVIM report
const RECVIM_FIELDS: usize = 10;

/// Split a line on commas.
///
/// Empty fields are kept. At most [`crate::MAX_FIELDS`] fields are
/// returned (the rest of the line is ignored) and each field is cut to
/// [`crate::MAX_FIELD_WIDTH`] bytes.
pub fn split_fields(line: &str) -> Vec<String> {
    line.split(',')
        .take(crate::MAX_FIELDS)
        .map(|field| truncate_utf8(field, crate::MAX_FIELD_WIDTH).to_string())
        .collect()
}

/// Lenient integer parse of an address field.
///
/// Skips leading whitespace, accepts an optional sign and reads digits up
/// to the first non-digit. Text without leading digits yields 0, so a zero
/// address never proves the field was numeric. Out-of-range values
/// saturate.
pub fn parse_address(field: &str) -> NodeAddress {
    let trimmed = field.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\x0b');
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(byte - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as NodeAddress
}

/// Receiver - stateless decoder for inbound lines
pub struct Receiver;

impl Receiver {
    /// Decode one inbound line
    ///
    /// # Arguments
    /// * `line` - A single line from the link, trailing CR/LF allowed
    ///
    /// # Errors
    /// `MalformedFrame` when the line is neither a RECVIM report with a
    /// known inner message nor a DELIVERED report.
    pub fn decode(line: &str) -> Result<Frame> {
        let fields = split_fields(line);

        if fields[0] == RECVIM_TAG && fields.len() >= RECVIM_FIELDS {
            let source = parse_address(&fields[2]);
            let destination = parse_address(&fields[3]);
            let inner = fields[9].as_str();

            return if inner.starts_with("RTS") {
                Ok(Frame::new(source, destination, MessageKind::Rts, "RTS"))
            } else if inner.starts_with("CTS") {
                Ok(Frame::new(source, destination, MessageKind::Cts, "CTS"))
            } else if let Some(data) = inner.strip_prefix(INFO_PREFIX) {
                let data = data.trim_end_matches(['\r', '\n']);
                let payload = truncate_utf8(data, crate::MAX_PAYLOAD_LEN);
                Ok(Frame::new(source, destination, MessageKind::Info, payload))
            } else {
                Err(DacapError::MalformedFrame(format!(
                    "unknown inner message type {:?}",
                    inner.trim_end_matches(['\r', '\n'])
                )))
            };
        }

        if fields[0].starts_with(DELIVERED_TAG) && fields.len() >= 2 {
            // Delivery reports echo our own transmission; there is no remote source
            let destination = parse_address(&fields[1]);
            return Ok(Frame::new(destination, destination, MessageKind::Delivered, ""));
        }

        Err(DacapError::MalformedFrame(format!(
            "unrecognized line {:?}",
            line.trim_end_matches(['\r', '\n'])
        )))
    }
}
