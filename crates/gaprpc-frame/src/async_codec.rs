use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig, HEADER_SIZE};
use crate::error::FrameError;

/// `tokio_util` codec over the same wire format as [`crate::FrameReader`].
#[derive(Debug, Clone, Default)]
pub struct LinkCodec {
    config: FrameConfig,
    discard: usize,
}

impl LinkCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self { config, discard: 0 }
    }
}

impl Decoder for LinkCodec {
    type Item = Frame;
    type Error = FrameError;

    /// An oversized frame is reported once and then skipped.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.discard > 0 {
            let n = self.discard.min(src.len());
            src.advance(n);
            self.discard -= n;
            if self.discard > 0 {
                return Ok(None);
            }
        }
        match decode_frame(src, self.config.max_payload_size) {
            Err(FrameError::PayloadTooLarge { size, max }) => {
                self.discard = HEADER_SIZE + size;
                Err(FrameError::PayloadTooLarge { size, max })
            }
            other => other,
        }
    }
}

impl Encoder<Frame> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(item.packet_type, &item.payload, dst)
    }
}
