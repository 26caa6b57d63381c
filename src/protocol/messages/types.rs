//! Wire sub-objects shared between messages.
//!
//! These are not messages themselves: they carry no protocol id and only
//! ever appear nested inside a message body, encoded back-to-back inside
//! count-prefixed sequences.

use crate::protocol::codec::{CodecError, PacketReader, PacketWriter};

/// One stack of items in an inventory slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: u32,
    pub quantity: u16,
    pub slot: u8,
}

impl ItemStack {
    pub fn serialize(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_varuint32(self.item_id);
        w.write_varuint16(self.quantity);
        w.write_u8(self.slot);
        Ok(())
    }

    pub fn deserialize(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            item_id: r.read_varuint32()?,
            quantity: r.read_varuint16()?,
            slot: r.read_u8()?,
        })
    }
}
