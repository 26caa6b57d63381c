//! Id → empty-instance factory.
//!
//! The frame header is decoded before the body, so the concrete type
//! (and hence which `deserialize` to call) is only known once the id has
//! been read. The factory closes that loop: it maps an id to a freshly
//! constructed, field-default instance of the matching type.
//!
//! One factory per id namespace. Registries are populated once at
//! startup and never mutated afterwards, so lookups need no locking.

use std::collections::HashMap;

use super::{Message, ProtocolError, MAX_PROTOCOL_ID};

type Constructor = fn() -> Box<dyn Message>;

/// Immutable-after-startup mapping from protocol id to constructor.
#[derive(Default)]
pub struct MessageFactory {
    ctors: HashMap<u16, Constructor>,
}

impl MessageFactory {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registers a constructor for `id`.
    ///
    /// Duplicate ids and ids outside the 14-bit header field are startup
    /// programming errors, so they panic rather than return.
    pub fn register(&mut self, id: u16, ctor: Constructor) {
        assert!(
            id <= MAX_PROTOCOL_ID,
            "protocol id {id} does not fit in 14 bits"
        );
        let prev = self.ctors.insert(id, ctor);
        assert!(prev.is_none(), "duplicate protocol id {id}");
    }

    /// Constructs an empty instance for `id`, ready for `deserialize`.
    pub fn create(&self, id: u16) -> Result<Box<dyn Message>, ProtocolError> {
        match self.ctors.get(&id) {
            Some(ctor) => Ok(ctor()),
            None => Err(ProtocolError::UnknownMessageType { id }),
        }
    }

    /// True if `id` has a registered constructor.
    pub fn knows(&self, id: u16) -> bool {
        self.ctors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}
