//! Type-indexed dispatch table.
//!
//! Built once at process start from each server's registration list and
//! never mutated afterwards, so lookups take no lock. The key is the
//! concrete message type, not the protocol id: the decode pipeline hands
//! over an already-typed message, and the table downcasts it so handlers
//! receive the concrete struct.
//!
//! Handler faults stop at this boundary. A handler returning an error is
//! logged and the connection keeps going; it never unwinds into the read
//! loop.

use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::connection::Connection;
use crate::protocol::Message;

type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type HandlerFn = Box<dyn Fn(Arc<Connection>, Box<dyn Message>) -> HandlerFuture + Send + Sync>;

struct Entry {
    invoke: HandlerFn,
}

/// Collects handler registrations at startup. `build` freezes the table.
#[derive(Default)]
pub struct DispatchTableBuilder {
    entries: HashMap<TypeId, Entry>,
}

impl DispatchTableBuilder {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers `f` as the handler for message type `M`.
    ///
    /// At most one handler per concrete type; a second registration for
    /// the same type is a startup programming error and panics.
    pub fn on<M, F, Fut>(mut self, f: F) -> Self
    where
        M: Message + 'static,
        F: Fn(Arc<Connection>, M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let entry = Entry {
            invoke: Box::new(move |conn, message| -> HandlerFuture {
                match message.into_any().downcast::<M>() {
                    Ok(concrete) => Box::pin(f(conn, *concrete)),
                    Err(_) => Box::pin(async {
                        anyhow::bail!("dispatch key does not match the delivered message type")
                    }),
                }
            }),
        };
        let prev = self.entries.insert(TypeId::of::<M>(), entry);
        assert!(
            prev.is_none(),
            "a handler is already registered for {}",
            std::any::type_name::<M>()
        );
        self
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            entries: self.entries,
        }
    }
}

/// Immutable message-type → handler map.
pub struct DispatchTable {
    entries: HashMap<TypeId, Entry>,
}

impl DispatchTable {
    /// Routes one decoded message to its handler and awaits completion.
    ///
    /// A message without a handler is dropped; not every message needs
    /// one. The await is what gives each connection its strict frame
    /// ordering: the caller does not decode the next frame until this
    /// returns.
    pub async fn dispatch(&self, conn: Arc<Connection>, message: Box<dyn Message>) {
        let name = message.message_name();
        let id = message.protocol_id();
        match self.entries.get(&message.as_any().type_id()) {
            None => {
                tracing::trace!(
                    "[dispatch] [no_handler] conn={} id={} name={}",
                    conn.id(),
                    id,
                    name
                );
            }
            Some(entry) => {
                if let Err(e) = (entry.invoke)(Arc::clone(&conn), message).await {
                    tracing::error!(
                        "[dispatch] [handler_fault] conn={} id={} name={} err={:#}",
                        conn.id(),
                        id,
                        name,
                        e
                    );
                }
            }
        }
    }

    /// True if a handler is registered for `M`.
    pub fn handles<M: Message + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<M>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
