// carta-proto/src/frame.rs
// Binary frame codec: an 8-byte little-endian header followed by the
// protobuf-encoded payload.

use prost::Message;
use thiserror::Error;

use crate::events::EventType;

/// Interface compatibility version stamped into every frame. Frames with a
/// different version are rejected on ingress and logged on egress.
pub const ICD_VERSION: u16 = 30;

/// Header length in bytes: u16 event type, u16 ICD version, u32 request id.
pub const HEADER_LEN: usize = 8;

/// Frame codec error type
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("message too short: {0} bytes")]
    ShortFrame(usize),
    #[error("invalid ICD version: {got} (expected {ICD_VERSION})")]
    VersionMismatch { got: u16 },
    #[error("payload encoding failed: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("payload decoding failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Decoded frame prefix, used to match requests to responses and to pick a
/// dispatch handler. The payload starts at byte 8 of the raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub event_type: u16,
    pub icd_version: u16,
    pub request_id: u32,
}

impl FrameHeader {
    /// Known event type for this frame, if the opcode is in the registry.
    pub fn known_type(&self) -> Option<EventType> {
        EventType::from_u16(self.event_type)
    }
}

/// Decodes the 8-byte frame prefix and validates the ICD version.
pub fn decode_header(data: &[u8]) -> Result<FrameHeader, FrameError> {
    if data.len() < HEADER_LEN {
        return Err(FrameError::ShortFrame(data.len()));
    }

    let header = FrameHeader {
        event_type: u16::from_le_bytes([data[0], data[1]]),
        icd_version: u16::from_le_bytes([data[2], data[3]]),
        request_id: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
    };

    if header.icd_version != ICD_VERSION {
        return Err(FrameError::VersionMismatch {
            got: header.icd_version,
        });
    }

    Ok(header)
}

/// Serializes a message and prepends the frame header.
pub fn encode_frame<M: Message>(
    msg: &M,
    event_type: EventType,
    request_id: u32,
) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::with_capacity(HEADER_LEN + msg.encoded_len());
    write_header(&mut buf, event_type as u16, request_id);
    msg.encode(&mut buf)?;
    Ok(buf)
}

/// Rebuilds a frame from a raw opcode and an already-encoded payload.
/// Used on the proxy path, where dispatch has stripped the header.
pub fn encode_raw(event_type: u16, request_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    write_header(&mut buf, event_type, request_id);
    buf.extend_from_slice(payload);
    buf
}

fn write_header(buf: &mut Vec<u8>, event_type: u16, request_id: u32) {
    buf.extend_from_slice(&event_type.to_le_bytes());
    buf.extend_from_slice(&ICD_VERSION.to_le_bytes());
    buf.extend_from_slice(&request_id.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RegisterViewer;

    #[test]
    fn test_header_round_trip() {
        let msg = RegisterViewer {
            session_id: 7,
            api_key: String::new(),
            client_feature_flags: 0,
        };
        let frame = encode_frame(&msg, EventType::RegisterViewer, 42).unwrap();

        let header = decode_header(&frame).unwrap();
        assert_eq!(header.event_type, EventType::RegisterViewer as u16);
        assert_eq!(header.icd_version, ICD_VERSION);
        assert_eq!(header.request_id, 42);
        assert_eq!(header.known_type(), Some(EventType::RegisterViewer));
        assert_eq!(&frame[HEADER_LEN..], msg.encode_to_vec().as_slice());
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = decode_header(&[1, 0, 30]).unwrap_err();
        assert!(matches!(err, FrameError::ShortFrame(3)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut frame = encode_raw(EventType::SetCursor as u16, 1, &[]);
        frame[2] = 29;
        frame[3] = 0;
        let err = decode_header(&frame).unwrap_err();
        assert!(matches!(err, FrameError::VersionMismatch { got: 29 }));
    }

    #[test]
    fn test_encode_raw_matches_typed_encode() {
        let msg = RegisterViewer {
            session_id: 3,
            api_key: "k".to_string(),
            client_feature_flags: 1,
        };
        let typed = encode_frame(&msg, EventType::RegisterViewer, 9).unwrap();
        let raw = encode_raw(
            EventType::RegisterViewer as u16,
            9,
            &msg.encode_to_vec(),
        );
        assert_eq!(typed, raw);
    }
}
