use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::PacketType;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Frame header: length (2) + packet type (1) = 3 bytes.
pub const HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + 1;

/// Largest payload the 16-bit length prefix can describe.
pub const MAX_WIRE_PAYLOAD: usize = u16::MAX as usize - 1;

/// Default maximum payload size: 4 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 4 * 1024;

/// One serialization packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// What the packet carries.
    pub packet_type: PacketType,
    /// The packet body (opcode/event id onward).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────┬──────────────────┐
/// │ Length (2B)  │ Packet type │ Payload          │
/// │ LE, = 1 + N  │ (1B)        │ (N bytes)        │
/// └──────────────┴─────────────┴──────────────────┘
/// ```
pub fn encode_frame(packet_type: PacketType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_WIRE_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_WIRE_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u16_le((payload.len() + 1) as u16);
    dst.put_u8(packet_type.as_u8());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A zero length
/// prefix is consumed before `EmptyFrame` is returned, so the stream can
/// continue past it.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None); // Need more data
    }

    let frame_len = u16::from_le_bytes([src[0], src[1]]) as usize;
    if frame_len == 0 {
        src.advance(LENGTH_PREFIX_SIZE);
        return Err(FrameError::EmptyFrame);
    }

    let payload_len = frame_len - 1;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < LENGTH_PREFIX_SIZE + frame_len {
        return Ok(None); // Need more data
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let packet_type = PacketType::from(src.get_u8());
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        packet_type,
        payload,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 4 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = [0x7F, 0x00, 0xA0, 0x00];

        encode_frame(PacketType::Command, &payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
        assert_eq!(&buf[..3], &[0x05, 0x00, 0x00]);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.packet_type, PacketType::Command);
        assert_eq!(frame.payload.as_ref(), &payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x05][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(PacketType::Response, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2); // Truncate payload

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_zero_length_is_skipped() {
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        encode_frame(PacketType::Event, b"e", &mut buf).unwrap();

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::EmptyFrame)));

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.packet_type, PacketType::Event);
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(9000);
        buf.put_u8(1);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { size: 8999, .. })));
    }

    #[test]
    fn test_encode_rejects_unframeable_payload() {
        let mut buf = BytesMut::new();
        let payload = vec![0u8; MAX_WIRE_PAYLOAD + 1];
        let result = encode_frame(PacketType::Command, &payload, &mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(PacketType::Response, b"first", &mut buf).unwrap();
        encode_frame(PacketType::Event, b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.packet_type, PacketType::Response);
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.packet_type, PacketType::Event);
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_unknown_packet_type_decodes() {
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x09, 0xAA][..]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.packet_type, PacketType::Unknown(0x09));
        assert_eq!(frame.payload.as_ref(), &[0xAA]);
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(PacketType::Command, b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.packet_type, PacketType::Command);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(PacketType::Event, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
