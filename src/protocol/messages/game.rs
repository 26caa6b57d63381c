//! Game namespace: the messages spoken against the game server. Ids
//! here are disjoint from the connection-setup namespace.

use std::any::Any;

use crate::protocol::codec::{CodecError, PacketReader, PacketWriter};
use crate::protocol::factory::MessageFactory;
use crate::protocol::messages::types::ItemStack;
use crate::protocol::Message;

/// Hands the login-issued ticket to the game server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationTicketMessage {
    pub ticket: String,
}

impl AuthenticationTicketMessage {
    pub const ID: u16 = 110;
}

impl Message for AuthenticationTicketMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "AuthenticationTicketMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_utf8_len16(&self.ticket)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
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

/// Empty-bodied acknowledgement: encodes to a bare 2-byte frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationTicketAcceptedMessage;

impl AuthenticationTicketAcceptedMessage {
    pub const ID: u16 = 111;
}

impl Message for AuthenticationTicketAcceptedMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "AuthenticationTicketAcceptedMessage"
    }

    fn serialize(&self, _w: &mut PacketWriter) -> Result<(), CodecError> {
        Ok(())
    }

    fn deserialize(&mut self, _r: &mut PacketReader) -> Result<(), CodecError> {
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
pub struct AuthenticationTicketRefusedMessage {
    pub reason: u8,
}

impl AuthenticationTicketRefusedMessage {
    pub const ID: u16 = 112;
}

impl Message for AuthenticationTicketRefusedMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "AuthenticationTicketRefusedMessage"
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

/// Keep-alive, no body. The server answers with the same message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatMessage;

impl HeartbeatMessage {
    pub const ID: u16 = 182;
}

impl Message for HeartbeatMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "HeartbeatMessage"
    }

    fn serialize(&self, _w: &mut PacketWriter) -> Result<(), CodecError> {
        Ok(())
    }

    fn deserialize(&mut self, _r: &mut PacketReader) -> Result<(), CodecError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Plays an emote, optionally aimed at another character by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotePlayRequestMessage {
    pub emote_id: i8,
    pub target: String,
}

impl EmotePlayRequestMessage {
    pub const ID: u16 = 75;
}

impl Message for EmotePlayRequestMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "EmotePlayRequestMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_i8(self.emote_id);
        w.write_utf8_len16(&self.target)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.emote_id = r.read_i8()?;
        self.target = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Confirms an emote to the map: who played what.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotePlayMessage {
    pub actor_id: u64,
    pub emote_id: i8,
}

impl EmotePlayMessage {
    pub const ID: u16 = 76;
}

impl Message for EmotePlayMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "EmotePlayMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_varuint64(self.actor_id);
        w.write_i8(self.emote_id);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.actor_id = r.read_varuint64()?;
        self.emote_id = r.read_i8()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Client chat line on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatClientMessage {
    pub channel: u8,
    pub content: String,
}

impl ChatClientMessage {
    pub const ID: u16 = 851;
}

impl Message for ChatClientMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "ChatClientMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_u8(self.channel);
        w.write_utf8_len16(&self.content)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.channel = r.read_u8()?;
        self.content = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Private chat line: the base chat layout plus the receiver's name,
/// appended after the base fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatClientPrivateMessage {
    pub base: ChatClientMessage,
    pub receiver: String,
}

impl ChatClientPrivateMessage {
    pub const ID: u16 = 852;
}

impl Message for ChatClientPrivateMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "ChatClientPrivateMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        self.base.serialize(w)?;
        w.write_utf8_len16(&self.receiver)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.base.deserialize(r)?;
        self.receiver = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Server-stamped chat line broadcast to clients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatServerMessage {
    pub channel: u8,
    pub content: String,
    pub timestamp: i32,
    pub sender_id: u64,
    pub sender_name: String,
}

impl ChatServerMessage {
    pub const ID: u16 = 881;
}

impl Message for ChatServerMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "ChatServerMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_u8(self.channel);
        w.write_utf8_len16(&self.content)?;
        w.write_i32(self.timestamp);
        w.write_varuint64(self.sender_id);
        w.write_utf8_len16(&self.sender_name)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.channel = r.read_u8()?;
        self.content = r.read_utf8_len16()?;
        self.timestamp = r.read_i32()?;
        self.sender_id = r.read_varuint64()?;
        self.sender_name = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Copy of a private chat line echoed back to its author. Extends the
/// base chat layout with the receiver's name: the wire body is the base
/// fields first, then the extra field, in that fixed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatServerCopyMessage {
    pub base: ChatServerMessage,
    pub receiver_name: String,
}

impl ChatServerCopyMessage {
    pub const ID: u16 = 882;
}

impl Message for ChatServerCopyMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "ChatServerCopyMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        self.base.serialize(w)?;
        w.write_utf8_len16(&self.receiver_name)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.base.deserialize(r)?;
        self.receiver_name = r.read_utf8_len16()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Character sheet snapshot pushed after login.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterStatsMessage {
    pub level: u16,
    pub experience: f64,
    pub health: i32,
    pub alive: bool,
}

impl CharacterStatsMessage {
    pub const ID: u16 = 500;
}

impl Message for CharacterStatsMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "CharacterStatsMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_varuint16(self.level);
        w.write_f64(self.experience);
        w.write_i32(self.health);
        w.write_bool(self.alive);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.level = r.read_varuint16()?;
        self.experience = r.read_f64()?;
        self.health = r.read_i32()?;
        self.alive = r.read_bool()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Client asks to walk a path of cells on a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapMovementRequestMessage {
    pub key_cells: Vec<u16>,
    pub map_id: u32,
}

impl MapMovementRequestMessage {
    pub const ID: u16 = 950;
}

impl Message for MapMovementRequestMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "MapMovementRequestMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        let count_at = w.reserve_u16();
        for cell in &self.key_cells {
            w.write_u16(*cell);
        }
        w.patch_u16(count_at, self.key_cells.len() as u16)?;
        w.write_varuint32(self.map_id);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        let count = r.read_u16()?;
        self.key_cells = Vec::with_capacity(usize::from(count.min(64)));
        for _ in 0..count {
            self.key_cells.push(r.read_u16()?);
        }
        self.map_id = r.read_varuint32()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An actor's accepted movement, broadcast to the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapMovementMessage {
    pub actor_id: u64,
    pub key_cells: Vec<u16>,
}

impl MapMovementMessage {
    pub const ID: u16 = 951;
}

impl Message for MapMovementMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "MapMovementMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_varuint64(self.actor_id);
        let count_at = w.reserve_u16();
        for cell in &self.key_cells {
            w.write_u16(*cell);
        }
        w.patch_u16(count_at, self.key_cells.len() as u16)
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        self.actor_id = r.read_varuint64()?;
        let count = r.read_u16()?;
        self.key_cells = Vec::with_capacity(usize::from(count.min(64)));
        for _ in 0..count {
            self.key_cells.push(r.read_u16()?);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Full inventory snapshot: a count-prefixed sequence of item stacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryContentMessage {
    pub items: Vec<ItemStack>,
    pub gold: u64,
}

impl InventoryContentMessage {
    pub const ID: u16 = 3016;
}

impl Message for InventoryContentMessage {
    fn protocol_id(&self) -> u16 {
        Self::ID
    }

    fn message_name(&self) -> &'static str {
        "InventoryContentMessage"
    }

    fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        let count_at = w.reserve_u16();
        for item in &self.items {
            item.serialize(w)?;
        }
        w.patch_u16(count_at, self.items.len() as u16)?;
        w.write_varuint64(self.gold);
        Ok(())
    }

    fn deserialize(&mut self, r: &mut PacketReader) -> Result<(), CodecError> {
        let count = r.read_u16()?;
        self.items = Vec::with_capacity(usize::from(count.min(64)));
        for _ in 0..count {
            self.items.push(ItemStack::deserialize(r)?);
        }
        self.gold = r.read_varuint64()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Registers every game-namespace message. Called once at startup.
pub fn register(f: &mut MessageFactory) {
    f.register(AuthenticationTicketMessage::ID, || {
        Box::<AuthenticationTicketMessage>::default()
    });
    f.register(AuthenticationTicketAcceptedMessage::ID, || {
        Box::<AuthenticationTicketAcceptedMessage>::default()
    });
    f.register(AuthenticationTicketRefusedMessage::ID, || {
        Box::<AuthenticationTicketRefusedMessage>::default()
    });
    f.register(HeartbeatMessage::ID, || Box::<HeartbeatMessage>::default());
    f.register(EmotePlayRequestMessage::ID, || {
        Box::<EmotePlayRequestMessage>::default()
    });
    f.register(EmotePlayMessage::ID, || Box::<EmotePlayMessage>::default());
    f.register(ChatClientMessage::ID, || {
        Box::<ChatClientMessage>::default()
    });
    f.register(ChatClientPrivateMessage::ID, || {
        Box::<ChatClientPrivateMessage>::default()
    });
    f.register(ChatServerMessage::ID, || {
        Box::<ChatServerMessage>::default()
    });
    f.register(ChatServerCopyMessage::ID, || {
        Box::<ChatServerCopyMessage>::default()
    });
    f.register(CharacterStatsMessage::ID, || {
        Box::<CharacterStatsMessage>::default()
    });
    f.register(MapMovementRequestMessage::ID, || {
        Box::<MapMovementRequestMessage>::default()
    });
    f.register(MapMovementMessage::ID, || {
        Box::<MapMovementMessage>::default()
    });
    f.register(InventoryContentMessage::ID, || {
        Box::<InventoryContentMessage>::default()
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

    fn roundtrip<M: Message + Default + PartialEq + std::fmt::Debug>(msg: &M) {
        let mut w = PacketWriter::new();
        msg.serialize(&mut w).unwrap();
        let buf = w.into_inner();
        let mut out = M::default();
        out.deserialize(&mut PacketReader::new(&buf)).unwrap();
        assert_eq!(&out, msg);
    }

    #[test]
    fn test_chat_server_roundtrip() {
        roundtrip(&ChatServerMessage {
            channel: 2,
            content: "sel ling rare hat".into(),
            timestamp: 1_700_000,
            sender_id: 8_589_934_592,
            sender_name: "Pif".into(),
        });
    }

    #[test]
    fn test_derived_message_extends_base_layout() {
        let base = ChatServerMessage {
            channel: 9,
            content: "psst".into(),
            timestamp: 42,
            sender_id: 7,
            sender_name: "Ame".into(),
        };
        let copy = ChatServerCopyMessage {
            base: base.clone(),
            receiver_name: "Lou".into(),
        };

        let mut w_base = PacketWriter::new();
        base.serialize(&mut w_base).unwrap();
        let mut w_copy = PacketWriter::new();
        copy.serialize(&mut w_copy).unwrap();

        // the derived body starts with the exact base body bytes
        assert_eq!(
            &w_copy.as_slice()[..w_base.position()],
            w_base.as_slice()
        );
        roundtrip(&copy);
    }

    #[test]
    fn test_movement_sequence_count_is_patched() {
        let msg = MapMovementRequestMessage {
            key_cells: vec![101, 215, 330],
            map_id: 12_345,
        };
        let mut w = PacketWriter::new();
        msg.serialize(&mut w).unwrap();
        // count prefix patched in front of the elements
        assert_eq!(&w.as_slice()[..2], &[0x00, 0x03]);
        roundtrip(&msg);
    }

    #[test]
    fn test_inventory_nested_sequence_roundtrip() {
        roundtrip(&InventoryContentMessage {
            items: vec![
                ItemStack {
                    item_id: 44,
                    quantity: 1,
                    slot: 0,
                },
                ItemStack {
                    item_id: 90_001,
                    quantity: 250,
                    slot: 9,
                },
            ],
            gold: 123_456_789,
        });
    }

    #[test]
    fn test_empty_sequence_roundtrip() {
        roundtrip(&MapMovementMessage {
            actor_id: 1,
            key_cells: vec![],
        });
    }

    #[test]
    fn test_stats_roundtrip() {
        roundtrip(&CharacterStatsMessage {
            level: 200,
            experience: 7_999_999.5,
            health: -30,
            alive: false,
        });
    }

    #[test]
    fn test_factory_covers_namespace() {
        let f = factory();
        assert!(f.knows(HeartbeatMessage::ID));
        assert!(f.knows(InventoryContentMessage::ID));
        assert!(!f.knows(0x3FFF));
        assert_eq!(f.len(), 14);
    }
}
