//! Length-prefixed framing for envelopes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{ProtocolError, Result};
use crate::message::Envelope;

/// Size of the big-endian length header in front of every frame.
pub const HEADER_LEN: usize = 4;

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest frame body accepted in either direction, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(ProtocolError::InvalidConfig(
                "message size limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    config: CodecConfig,
}

impl FrameCodec {
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn max_message_size(&self) -> usize {
        self.config.max_message_size
    }

    pub fn encode(&self, envelope: &Envelope) -> Result<Bytes> {
        let body = serde_json::to_vec(envelope)?;
        let max = self.config.max_message_size.min(u32::MAX as usize);
        if body.len() > max {
            warn!(size = body.len(), max, "Refusing to encode oversized message");
            return Err(ProtocolError::MessageTooLarge {
                size: body.len(),
                max,
            });
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
        frame.put_u32(body.len() as u32);
        frame.extend_from_slice(&body);
        trace!(message_type = %envelope.message_type, size = body.len(), "Encoded frame");
        Ok(frame.freeze())
    }

    /// Take one frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` as it was while the frame is still
    /// incomplete. An oversized length header is rejected before any body
    /// bytes are consumed; a malformed body is consumed and reported.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Envelope>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let max = self.config.max_message_size;
        if size > max {
            warn!(size, max, "Rejecting oversized frame");
            return Err(ProtocolError::MessageTooLarge { size, max });
        }

        if buf.len() < HEADER_LEN + size {
            buf.reserve(HEADER_LEN + size - buf.len());
            return Ok(None);
        }

        buf.advance(HEADER_LEN);
        let body = buf.split_to(size);
        let envelope = Envelope::from_slice(&body).map_err(|e| {
            warn!(error = %e, "Discarding malformed frame");
            e
        })?;
        trace!(message_type = %envelope.message_type, size, "Decoded frame");
        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use conductor_core::RetVal;

    fn frame(body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(body.len() as u32);
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_encode_header_and_body() {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&Envelope::run()).unwrap();

        let body = br#"{"version":1,"type":"run","data":{}}"#;
        assert_eq!(&bytes[..HEADER_LEN], &(body.len() as u32).to_be_bytes());
        assert_eq!(&bytes[HEADER_LEN..], &body[..]);
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let codec = FrameCodec::default();
        let full = codec.encode(&Envelope::result(&RetVal::ok("hi")).unwrap()).unwrap();

        let mut buf = BytesMut::from(&full[..2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);

        buf.extend_from_slice(&full[2..full.len() - 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 1..]);
        let envelope = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(envelope.into_retval().unwrap(), RetVal::ok("hi"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&codec.encode(&Envelope::run()).unwrap());
        buf.extend_from_slice(&codec.encode(&Envelope::result(&RetVal::done()).unwrap()).unwrap());

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.message_type, MessageType::Run);
        assert!(second.into_retval().unwrap().is_done());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_too_large() {
        let codec = FrameCodec::new(CodecConfig {
            max_message_size: 16,
        })
        .unwrap();
        let result = codec.encode(&Envelope::error("this message is far too long"));
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { max: 16, .. })));
    }

    #[test]
    fn test_decode_rejects_large_header_without_consuming() {
        let codec = FrameCodec::new(CodecConfig {
            max_message_size: 8,
        })
        .unwrap();
        let mut buf = frame(br#"{"version":1,"type":"run","data":{}}"#);
        let before = buf.len();

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { max: 8, .. })));
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn test_decode_consumes_malformed_frame() {
        let codec = FrameCodec::default();
        let mut buf = frame(br#"{"type":"run","data":{}}"#);
        buf.extend_from_slice(&codec.encode(&Envelope::run()).unwrap());

        assert!(matches!(codec.decode(&mut buf), Err(ProtocolError::MissingVersion)));
        let next = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(next.message_type, MessageType::Run);
    }

    #[test]
    fn test_body_at_exact_limit_is_accepted() {
        let envelope = Envelope::run();
        let size = serde_json::to_vec(&envelope).unwrap().len();
        let codec = FrameCodec::new(CodecConfig {
            max_message_size: size,
        })
        .unwrap();

        let bytes = codec.encode(&envelope).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + size);

        let mut buf = BytesMut::from(&bytes[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(envelope.clone()));

        let tighter = FrameCodec::new(CodecConfig {
            max_message_size: size - 1,
        })
        .unwrap();
        assert!(matches!(
            tighter.encode(&envelope),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(matches!(
            tighter.decode(&mut buf),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let result = FrameCodec::new(CodecConfig {
            max_message_size: 0,
        });
        assert!(matches!(result, Err(ProtocolError::InvalidConfig(_))));
    }

    #[test]
    fn test_codec_config_defaults() {
        let config: CodecConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(FrameCodec::default().max_message_size(), DEFAULT_MAX_MESSAGE_SIZE);
    }
}
