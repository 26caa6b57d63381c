//! Connection-setup namespace: the messages spoken against the login
//! server, from the hello banner through world selection. Ids here are
//! disjoint from the game namespace.

use std::any::Any;

use crate::protocol::codec::{CodecError, PacketReader, PacketWriter};
use crate::protocol::factory::MessageFactory;
use crate::protocol::Message;

/// Server-initiated banner sent right after accept: the login salt and
/// the protocol version this server requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloConnectMessage {
    pub salt: String,
    pub required_version: u16,
}

impl HelloConnectMessage {
    pub const ID: u16 = 3;
}

impl Message for HelloConnectMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "HelloConnectMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_utf8_len16(&self.salt)?;
        w.write_u16(self.required_version);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.salt = r.read_utf8_len16()?;
        self.required_version = r.read_u16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Client credentials plus the client build version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentificationMessage {
    pub version: u16,
    pub account: String,
    pub password: String,
}

impl IdentificationMessage {
    pub const ID: u16 = 4;
}

impl Message for IdentificationMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "IdentificationMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_u16(self.version);
        w.write_utf8_len16(&self.account)?;
        w.write_utf8_len16(&self.password)?;
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.version = r.read_u16()?;
        self.account = r.read_utf8_len16()?;
        self.password = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Identification rejection reasons, as sent on the wire.
pub const ID_FAIL_BAD_VERSION: u8 = 1;
pub const ID_FAIL_WRONG_CREDENTIALS: u8 = 2;
pub const ID_FAIL_BANNED: u8 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentificationFailedMessage {
    pub reason: u8,
}

impl IdentificationFailedMessage {
    pub const ID: u16 = 20;
}

impl Message for IdentificationFailedMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "IdentificationFailedMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_u8(self.reason);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.reason = r.read_u8()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentificationSuccessMessage {
    pub account: String,
    pub nickname: String,
    pub has_admin_rights: bool,
}

impl IdentificationSuccessMessage {
    pub const ID: u16 = 22;
}

impl Message for IdentificationSuccessMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "IdentificationSuccessMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_utf8_len16(&self.account)?;
        w.write_utf8_len16(&self.nickname)?;
        w.write_bool(self.has_admin_rights);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.account = r.read_utf8_len16()?;
        self.nickname = r.read_utf8_len16()?;
        self.has_admin_rights = r.read_bool()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Client picks a world to play on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldSelectionMessage {
    pub world_id: u16,
}

impl WorldSelectionMessage {
    pub const ID: u16 = 40;
}

impl Message for WorldSelectionMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "WorldSelectionMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_u16(self.world_id);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.world_id = r.read_u16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Where the selected world lives, plus the one-shot ticket the game
/// server will accept in place of credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldAddressMessage {
    pub address: String,
    pub port: u16,
    pub ticket: String,
}

impl WorldAddressMessage {
    pub const ID: u16 = 42;
}

impl Message for WorldAddressMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "WorldAddressMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_utf8_len16(&self.address)?;
        w.write_u16(self.port);
        w.write_utf8_len16(&self.ticket)?;
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.address = r.read_utf8_len16()?;
        self.port = r.read_u16()?;
        self.ticket = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Registers every connection-setup message. Called once at startup.
pub fn register(f: &mut MessageFactory) {
    f.register(HelloConnectMessage::ID, || {
        Box::<HelloConnectMessage>::default()
    });
    f.register(IdentificationMessage::ID, || {
        Box::<IdentificationMessage>::default()
    });
    f.register(IdentificationFailedMessage::ID, || {
        Box::<IdentificationFailedMessage>::default()
    });
    f.register(IdentificationSuccessMessage::ID, || {
        Box::<IdentificationSuccessMessage>::default()
    });
    f.register(WorldSelectionMessage::ID, || {
        Box::<WorldSelectionMessage>::default()
    });
    f.register(WorldAddressMessage::ID, || {
        Box::<WorldAddressMessage>::default()
    });
}

/// A freshly built factory covering this namespace.
pub fn factory() -> MessageFactory {
    let mut f = MessageFactory::new();
    register(&mut f);
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identification_roundtrip() {
        let msg = IdentificationMessage {
            version: 129,
            account: "morgane".into(),
            password: "hunter2".into(),
        };
        let mut w = PacketWriter::new();
        msg.serialize(&mut w).unwrap();
        let buf = w.into_inner();

        let mut out = IdentificationMessage::default();
        out.deserialize(&mut PacketReader::new(&buf)).unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn test_world_address_roundtrip() {
        let msg = WorldAddressMessage {
            address: "play.example.net".into(),
            port: 5555,
            ticket: "a1b2c3d4".into(),
        };
        let mut w = PacketWriter::new();
        msg.serialize(&mut w).unwrap();
        let buf = w.into_inner();

        let mut out = WorldAddressMessage::default();
        out.deserialize(&mut PacketReader::new(&buf)).unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn test_factory_covers_namespace() {
        let f = factory();
        assert!(f.knows(HelloConnectMessage::ID));
        assert!(f.knows(WorldAddressMessage::ID));
        assert_eq!(f.len(), 6);
    }
}
