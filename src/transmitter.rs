//! Transmitter module - outbound half of the frame codec
//!
//! Builds the `AT*SENDIM` command lines understood by the acoustic modem.
//! The format is reproduced byte for byte so existing peers interoperate:
//!
//! ```text
//! AT*SENDIM,<payload length>,<destination>,<noack|ack>,<payload>\n
//! ```

use crate::contracts::{MessageKind, NodeAddress, OutgoingFrame};

/// Prefix carried by every INFO payload
pub const INFO_PREFIX: &str = "INFO;";

/// Cut `text` to at most `max_len` bytes without splitting a character
pub(crate) fn truncate_utf8(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Transmitter - stateless encoder for outgoing frames
pub struct Transmitter;

impl Transmitter {
    /// Encode a control or data frame into its wire line
    ///
    /// # Arguments
    /// * `destination` - Node the frame is addressed to
    /// * `kind` - RTS, CTS or INFO
    /// * `data` - INFO data, ignored for control frames
    ///
    /// # Returns
    /// The complete line, newline included. DELIVERED is produced by the
    /// modem and never sent by a node, so it encodes to an empty string
    /// ("nothing to send").
    ///
    /// INFO payloads are bounded by [`crate::INFO_BUFFER_SIZE`]: the text
    /// `"INFO;" + data` is cut to 29 bytes.
    pub fn encode(destination: NodeAddress, kind: MessageKind, data: Option<&str>) -> String {
        Self::encode_frame(destination, kind, data)
            .map(|frame| frame.line)
            .unwrap_or_default()
    }

    /// Encode into an [`OutgoingFrame`], `None` when the kind is not sendable
    pub fn encode_frame(
        destination: NodeAddress,
        kind: MessageKind,
        data: Option<&str>,
    ) -> Option<OutgoingFrame> {
        let (payload, ack) = Self::payload(kind, data)?;
        Some(OutgoingFrame {
            kind,
            destination,
            line: format!(
                "AT*SENDIM,{},{},{},{}\n",
                payload.len(),
                destination,
                ack,
                payload
            ),
            payload_len: payload.len(),
        })
    }

    /// Payload text and acknowledgement flag for a kind
    fn payload(kind: MessageKind, data: Option<&str>) -> Option<(String, &'static str)> {
        match kind {
            MessageKind::Rts => Some(("RTS".to_string(), "noack")),
            MessageKind::Cts => Some(("CTS".to_string(), "noack")),
            MessageKind::Info => {
                let mut payload = String::with_capacity(crate::INFO_BUFFER_SIZE);
                payload.push_str(INFO_PREFIX);
                payload.push_str(data.unwrap_or_default());
                // One byte of the buffer is reserved for the terminator
                let bounded = truncate_utf8(&payload, crate::INFO_BUFFER_SIZE - 1).len();
                payload.truncate(bounded);
                Some((payload, "ack"))
            }
            MessageKind::Delivered => None,
        }
    }

    /// Longest INFO data that reaches the wire unmodified
    pub fn max_info_data_len() -> usize {
        crate::INFO_BUFFER_SIZE - 1 - INFO_PREFIX.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_control_frames() {
        assert_eq!(
            Transmitter::encode(5, MessageKind::Rts, None),
            "AT*SENDIM,3,5,noack,RTS\n"
        );
        assert_eq!(
            Transmitter::encode(12, MessageKind::Cts, Some("ignored")),
            "AT*SENDIM,3,12,noack,CTS\n"
        );
    }

    #[test]
    fn test_encode_info() {
        assert_eq!(
            Transmitter::encode(5, MessageKind::Info, Some("hello")),
            "AT*SENDIM,10,5,ack,INFO;hello\n"
        );
        assert_eq!(
            Transmitter::encode(5, MessageKind::Info, None),
            "AT*SENDIM,5,5,ack,INFO;\n"
        );
    }

    #[test]
    fn test_encode_info_truncation_point() {
        let message = "abcdefghijklmnopqrstuvwxyz0123456789ABCD";
        assert_eq!(message.len(), 40);

        let line = Transmitter::encode(5, MessageKind::Info, Some(message));
        assert_eq!(line, "AT*SENDIM,29,5,ack,INFO;abcdefghijklmnopqrstuvwx\n");
        assert_eq!(Transmitter::max_info_data_len(), 24);
    }

    #[test]
    fn test_encode_info_exact_fit() {
        let message = "x".repeat(24);
        let line = Transmitter::encode(7, MessageKind::Info, Some(&message));
        assert_eq!(line, format!("AT*SENDIM,29,7,ack,INFO;{}\n", message));
    }

    #[test]
    fn test_encode_info_multibyte_boundary() {
        // 23 ASCII bytes + a 2-byte character crossing the 24 byte limit
        let message = format!("{}é", "a".repeat(23));
        let line = Transmitter::encode(3, MessageKind::Info, Some(&message));
        assert_eq!(line, format!("AT*SENDIM,28,3,ack,INFO;{}\n", "a".repeat(23)));
    }

    #[test]
    fn test_encode_delivered_is_empty() {
        assert_eq!(Transmitter::encode(5, MessageKind::Delivered, None), "");
        assert!(Transmitter::encode_frame(5, MessageKind::Delivered, None).is_none());
    }

    #[test]
    fn test_encode_frame_metadata() {
        let frame = Transmitter::encode_frame(9, MessageKind::Info, Some("ping")).unwrap();
        assert_eq!(frame.kind, MessageKind::Info);
        assert_eq!(frame.destination, 9);
        assert_eq!(frame.payload_len, 9);
        assert_eq!(frame.line, Transmitter::encode(9, MessageKind::Info, Some("ping")));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("", 0), "");
    }
}
