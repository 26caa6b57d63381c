//! Frame envelope around one message.
//!
//! On the wire: a 16-bit header packing the 14-bit protocol id and a
//! 2-bit size-class, then 0–3 bytes of body length (MSB first, as many
//! bytes as the size-class says), then the body. The header and length
//! field are read together as one all-or-nothing step: until both are
//! fully available no cursor moves, so a decode attempt can always be
//! retried verbatim when more bytes arrive.

use super::codec::{PacketReader, PacketWriter};
use super::factory::MessageFactory;
use super::{Message, ProtocolError, MAX_PROTOCOL_ID};

/// Fixed header size: id + size-class.
pub const HEADER_LEN: usize = 2;

/// Largest body length a 3-byte length field can declare.
pub const MAX_BODY_LEN: usize = 0xFF_FFFF;

/// Result of one decode attempt against a buffer.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Not enough input for a complete frame. Retain the buffer and wait;
    /// nothing was consumed.
    NeedMoreData,

    /// One complete frame, decoded. `consumed` covers header, length
    /// field and body.
    Frame {
        consumed: usize,
        message: Box<dyn Message>,
    },

    /// A complete frame whose id has no factory registration. The body
    /// was skipped in full, so the stream stays synchronized; `consumed`
    /// covers the whole frame.
    Unknown {
        consumed: usize,
        id: u16,
        body_len: usize,
    },
}

/// Minimal size-class for a body of `len` bytes, or `None` when even the
/// 3-byte length field cannot express it.
fn size_class(len: usize) -> Option<u8> {
    match len {
        0 => Some(0),
        1..=0xFF => Some(1),
        0x100..=0xFFFF => Some(2),
        0x1_0000..=MAX_BODY_LEN => Some(3),
        _ => None,
    }
}

/// Serializes `message` into a complete frame.
///
/// The body is serialized first into a scratch buffer; its length picks
/// the minimal size-class, which in turn shapes the header.
pub fn encode(message: &dyn Message) -> Result<Vec<u8>, ProtocolError> {
    let id = message.protocol_id();
    if id > MAX_PROTOCOL_ID {
        return Err(ProtocolError::InvalidProtocolId { id });
    }

    let mut body = PacketWriter::new();
    message
        .serialize(&mut body)
        .map_err(|source| ProtocolError::SerializeFailed { id, source })?;
    let body = body.into_inner();

    let class = size_class(body.len()).ok_or(ProtocolError::BodyTooLarge {
        id,
        len: body.len(),
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + usize::from(class) + body.len());
    let header = (id << 2) | u16::from(class);
    out.extend_from_slice(&header.to_be_bytes());
    for i in (0..usize::from(class)).rev() {
        out.push((body.len() >> (8 * i)) as u8);
    }
    out.extend_from_slice(&body);
    Ok(out)
}

/// Attempts to decode exactly one frame from the front of `input`.
///
/// Never consumes anything on [`DecodeOutcome::NeedMoreData`]; the caller
/// keeps the buffer and retries after the next read. A decoder accepts
/// any size-class, minimal or not.
///
/// The only fatal outcome is `Err(MalformedBody)`: the declared body was
/// fully present but did not deserialize, so the caller cannot trust
/// frame boundaries past this point.
pub fn decode(input: &[u8], factory: &MessageFactory) -> Result<DecodeOutcome, ProtocolError> {
    if input.len() < HEADER_LEN {
        return Ok(DecodeOutcome::NeedMoreData);
    }
    let header = u16::from_be_bytes([input[0], input[1]]);
    let id = header >> 2;
    let len_bytes = usize::from(header & 0b11);

    if input.len() < HEADER_LEN + len_bytes {
        return Ok(DecodeOutcome::NeedMoreData);
    }
    let mut body_len = 0usize;
    for &b in &input[HEADER_LEN..HEADER_LEN + len_bytes] {
        body_len = (body_len << 8) | usize::from(b);
    }

    let total = HEADER_LEN + len_bytes + body_len;
    if input.len() < total {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    let mut message = match factory.create(id) {
        Ok(message) => message,
        Err(ProtocolError::UnknownMessageType { .. }) => {
            // Skip the declared body wholesale; the length field keeps us
            // aligned on the next frame boundary.
            return Ok(DecodeOutcome::Unknown {
                consumed: total,
                id,
                body_len,
            });
        }
        Err(e) => return Err(e),
    };

    let body = &input[HEADER_LEN + len_bytes..total];
    let mut reader = PacketReader::new(body);
    message
        .deserialize(&mut reader)
        .map_err(|source| ProtocolError::MalformedBody {
            id,
            name: message.message_name(),
            source,
        })?;

    Ok(DecodeOutcome::Frame {
        consumed: total,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::CodecError;
    use crate::protocol::messages::game::{
        self, ChatClientMessage, EmotePlayRequestMessage, HeartbeatMessage,
    };
    use std::any::Any;

    /// Opaque-body message used to drive exact body lengths.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct BlobMessage {
        data: Vec<u8>,
    }

    impl BlobMessage {
        const ID: u16 = 0x2A0;
    }

    impl Message for BlobMessage {
        fn protocol_id(&self) -> u16 {
            Self::ID
        }

        fn message_name(&self) -> &'static str {
            "BlobMessage"
        }

        fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
            w.write_bytes(&self.data);
            Ok(())
        }

        fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
            self.data = r.read_bytes(r.remaining())?.to_vec();
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    fn blob_factory() -> MessageFactory {
        let mut f = MessageFactory::new();
        f.register(BlobMessage::ID, || Box::<BlobMessage>::default());
        f
    }

    #[test]
    fn test_concrete_scenario_id_75() {
        let msg = EmotePlayRequestMessage {
            emote_id: 5,
            target: "hi".into(),
        };
        let frame = encode(&msg).unwrap();
        // header (75<<2)|1 = 0x012D, 1-byte length = 5,
        // body = i8 5, u16 strlen 2, 'h', 'i'
        assert_eq!(frame, [0x01, 0x2D, 0x05, 0x05, 0x00, 0x02, 0x68, 0x69]);

        let factory = game::factory();
        match decode(&frame, &factory).unwrap() {
            DecodeOutcome::Frame { consumed, message } => {
                assert_eq!(consumed, frame.len());
                let out = message.into_any().downcast::<EmotePlayRequestMessage>().unwrap();
                assert_eq!(*out, msg);
            }
            _ => panic!("expected a decoded frame"),
        }
    }

    #[test]
    fn test_empty_body_is_two_byte_frame() {
        let frame = encode(&HeartbeatMessage).unwrap();
        assert_eq!(frame, (182u16 << 2).to_be_bytes());

        let factory = game::factory();
        match decode(&frame, &factory).unwrap() {
            DecodeOutcome::Frame { consumed, message } => {
                assert_eq!(consumed, 2);
                assert_eq!(message.protocol_id(), HeartbeatMessage::ID);
            }
            _ => panic!("expected a decoded frame"),
        }
    }

    #[test]
    fn test_encoder_picks_minimal_size_class() {
        for (len, class, len_bytes) in [
            (0usize, 0u16, 0usize),
            (1, 1, 1),
            (255, 1, 1),
            (256, 2, 2),
            (65_535, 2, 2),
            (65_536, 3, 3),
        ] {
            let frame = encode(&BlobMessage {
                data: vec![0xEE; len],
            })
            .unwrap();
            let header = u16::from_be_bytes([frame[0], frame[1]]);
            assert_eq!(header & 0b11, class, "body len {len}");
            assert_eq!(frame.len(), 2 + len_bytes + len, "body len {len}");
        }
    }

    #[test]
    fn test_length_field_is_msb_first() {
        let frame = encode(&BlobMessage {
            data: vec![0xEE; 0x0102],
        })
        .unwrap();
        assert_eq!(&frame[2..4], &[0x01, 0x02]);
    }

    #[test]
    fn test_decoder_accepts_non_minimal_size_class() {
        // 3-byte body framed with size-class 2 instead of the minimal 1
        let mut frame = Vec::new();
        let header = (BlobMessage::ID << 2) | 2;
        frame.extend_from_slice(&header.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x03]);
        frame.extend_from_slice(&[9, 8, 7]);

        match decode(&frame, &blob_factory()).unwrap() {
            DecodeOutcome::Frame { consumed, message } => {
                assert_eq!(consumed, frame.len());
                let out = message.into_any().downcast::<BlobMessage>().unwrap();
                assert_eq!(out.data, vec![9, 8, 7]);
            }
            _ => panic!("expected a decoded frame"),
        }
    }

    #[test]
    fn test_need_more_data_at_every_boundary() {
        let factory = game::factory();
        let msg = ChatClientMessage {
            channel: 1,
            content: "hello there".into(),
        };
        let frame = encode(&msg).unwrap();

        // every strict prefix is insufficient
        for cut in 0..frame.len() {
            match decode(&frame[..cut], &factory).unwrap() {
                DecodeOutcome::NeedMoreData => {}
                _ => panic!("prefix of {cut} bytes should not decode"),
            }
        }
    }

    #[test]
    fn test_unknown_id_consumes_whole_frame() {
        // frame for an id nobody registered, body of 4 bytes
        let mut frame = Vec::new();
        let header = (0x1234u16 << 2) | 1;
        frame.extend_from_slice(&header.to_be_bytes());
        frame.push(4);
        frame.extend_from_slice(&[1, 2, 3, 4]);

        match decode(&frame, &game::factory()).unwrap() {
            DecodeOutcome::Unknown {
                consumed,
                id,
                body_len,
            } => {
                assert_eq!(consumed, frame.len());
                assert_eq!(id, 0x1234);
                assert_eq!(body_len, 4);
            }
            _ => panic!("expected the unknown-id outcome"),
        }
    }

    #[test]
    fn test_unknown_id_incomplete_body_waits() {
        let mut frame = Vec::new();
        let header = (0x1234u16 << 2) | 1;
        frame.extend_from_slice(&header.to_be_bytes());
        frame.push(4);
        frame.extend_from_slice(&[1, 2]); // 2 of 4 body bytes

        match decode(&frame, &game::factory()).unwrap() {
            DecodeOutcome::NeedMoreData => {}
            _ => panic!("must wait for the full declared body before skipping"),
        }
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        // ChatClientMessage whose string claims more bytes than the body has
        let mut frame = Vec::new();
        let header = (ChatClientMessage::ID << 2) | 1;
        frame.extend_from_slice(&header.to_be_bytes());
        frame.push(3); // body: channel + truncated length prefix
        frame.extend_from_slice(&[0x01, 0x00, 0x40]);

        let err = decode(&frame, &game::factory()).unwrap_err();
        match err {
            ProtocolError::MalformedBody { id, name, .. } => {
                assert_eq!(id, ChatClientMessage::ID);
                assert_eq!(name, "ChatClientMessage");
            }
            other => panic!("expected MalformedBody, got {other:?}"),
        }
    }

    #[test]
    fn test_body_too_large_rejected_at_encode() {
        let err = encode(&BlobMessage {
            data: vec![0; MAX_BODY_LEN + 1],
        })
        .unwrap_err();
        assert!(matches!(err, ProtocolError::BodyTooLarge { .. }));
    }

    #[test]
    fn test_two_frames_back_to_back_decode_independently() {
        let factory = game::factory();
        let first = encode(&HeartbeatMessage).unwrap();
        let second = encode(&ChatClientMessage {
            channel: 0,
            content: "gg".into(),
        })
        .unwrap();

        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let consumed_first = match decode(&stream, &factory).unwrap() {
            DecodeOutcome::Frame { consumed, message } => {
                assert_eq!(message.protocol_id(), HeartbeatMessage::ID);
                consumed
            }
            _ => panic!("expected first frame"),
        };
        match decode(&stream[consumed_first..], &factory).unwrap() {
            DecodeOutcome::Frame { message, .. } => {
                assert_eq!(message.protocol_id(), ChatClientMessage::ID);
            }
            _ => panic!("expected second frame"),
        }
    }
}
