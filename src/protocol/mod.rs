//! Binary protocol layer: primitive codec, frame envelope, message
//! identity, and the per-namespace message catalogs.
//!
//! Wire format, per connection, big-endian throughout:
//!
//! ```text
//! Frame  := Header(16 bits) LengthField(0..3 bytes) Body(declared length)
//! Header := ProtocolId(14 bits) | SizeClass(2 bits)
//! ```
//!
//! The size-class selects how many bytes carry the body length: 0 for an
//! empty body, then 1/2/3 bytes (MSB first) for bodies up to 255, 65535
//! and 16777215 bytes. Encoders always emit the minimal class; decoders
//! accept any class.
//!
//! Protocol ids live in two disjoint spaces: the connection-setup
//! namespace spoken against the login server and the game namespace
//! spoken against the game server. Each namespace has its own factory
//! registry; an id is only meaningful inside its own space.

pub mod codec;
pub mod factory;
pub mod frame;
pub mod messages;

use std::any::Any;

use codec::{CodecError, PacketReader, PacketWriter};

/// Largest id the 14-bit header field can carry.
pub const MAX_PROTOCOL_ID: u16 = 0x3FFF;

/// Frame-level errors. `InsufficientData` is deliberately absent: an
/// incomplete frame is a control signal ([`frame::DecodeOutcome::NeedMoreData`]),
/// never an error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// No factory registration for this id. Recoverable: the decoder
    /// skips the declared body and the stream stays synchronized.
    #[error("unknown message type: id={id}")]
    UnknownMessageType { id: u16 },

    /// The declared body was fully available but did not deserialize.
    /// Fatal for the connection: synchronization cannot be trusted
    /// past this point.
    #[error("malformed body for message id={id} ({name})")]
    MalformedBody {
        id: u16,
        name: &'static str,
        #[source]
        source: CodecError,
    },

    /// Serialization produced a body the length field cannot express.
    #[error("message id={id} body of {len} bytes exceeds the 3-byte length field")]
    BodyTooLarge { id: u16, len: usize },

    /// A message declared an id outside the 14-bit header field.
    #[error("protocol id {id} does not fit in 14 bits")]
    InvalidProtocolId { id: u16 },

    #[error("message body serialization failed for id={id}")]
    SerializeFailed {
        id: u16,
        #[source]
        source: CodecError,
    },
}

/// One unit of communication. Every concrete message type carries a
/// stable numeric protocol id and knows how to read and write its own
/// body over the primitive codec.
///
/// The trait object is only held at the frame boundary; inside a handler
/// the concrete type is known statically (the dispatch table downcasts
/// before invoking).
///
/// Round-trip law: for any value of a message type, `serialize` followed
/// by `deserialize` into a default instance reproduces an equal value,
/// field by field.
pub trait Message: Any + Send + Sync + std::fmt::Debug {
    /// Stable id, unique within this message's namespace.
    fn protocol_id(&self) -> u16;

    /// Human-readable type name, for logs.
    fn message_name(&self) -> &'static str;

    /// Writes the body fields in their fixed wire order.
    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError>;

    /// Reads the body fields in the same fixed order into `self`
    /// (the factory hands out field-default instances to fill).
    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}
