//! Login server: speaks the connection-setup namespace.
//!
//! Flow per client: server sends the hello banner on accept, the client
//! identifies (version gate + account check), then selects a world and
//! receives the game server's address plus a one-shot ticket. The ticket
//! handoff to the game server rides an out-of-process channel that is
//! not part of this emulator; the game server validates ticket shape
//! only.

pub mod handlers;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use rand::distr::Alphanumeric;
use rand::RngExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::config::{AccountEntry, ServerConfig};
use crate::network::{
    establish, run_read_loop, DispatchTable, DispatchTableBuilder, InboundPipeline,
};
use crate::protocol::factory::MessageFactory;
use crate::protocol::messages::connect::{
    self, HelloConnectMessage, IdentificationMessage, WorldSelectionMessage,
};

/// Characters in a login salt and in an issued ticket.
pub const SALT_LEN: usize = 32;
pub const TICKET_LEN: usize = 16;

pub struct LoginState {
    pub config: ServerConfig,
    /// account name → seeded entry, fixed at startup
    accounts: HashMap<String, AccountEntry>,
    /// conn id → account name, set by successful identification
    pub identified: Mutex<HashMap<u32, String>>,
}

impl LoginState {
    pub fn new(config: ServerConfig) -> Self {
        let accounts = config
            .accounts
            .iter()
            .map(|entry| (entry.account.clone(), entry.clone()))
            .collect();
        Self {
            config,
            accounts,
            identified: Mutex::new(HashMap::new()),
        }
    }

    pub fn account(&self, name: &str) -> Option<&AccountEntry> {
        self.accounts.get(name)
    }

    /// Builds the immutable handler table for this server: one entry per
    /// concrete message type, each bound to the shared state. Registered
    /// once here, never mutated afterwards.
    pub fn dispatch_table(state: &Arc<Self>) -> DispatchTable {
        let ident = Arc::clone(state);
        let world = Arc::clone(state);
        DispatchTableBuilder::new()
            .on::<IdentificationMessage, _, _>(move |conn, msg| {
                handlers::identification(Arc::clone(&ident), conn, msg)
            })
            .on::<WorldSelectionMessage, _, _>(move |conn, msg| {
                handlers::world_selection(Arc::clone(&world), conn, msg)
            })
            .build()
    }

    pub async fn run(state: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!("[login] [ready] addr={}", listener.local_addr()?);
        Self::serve(state, listener).await
    }

    /// Accept loop over an already-bound listener (tests bind port 0).
    pub async fn serve(state: Arc<Self>, listener: TcpListener) -> Result<()> {
        let factory = Arc::new(connect::factory());
        let table = Arc::new(Self::dispatch_table(&state));
        loop {
            let (stream, peer) = listener.accept().await?;
            let state = Arc::clone(&state);
            let factory = Arc::clone(&factory);
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                handle_client(state, factory, table, stream, peer).await;
            });
        }
    }
}

/// Random alphanumeric token for salts and tickets.
pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

async fn handle_client(
    state: Arc<LoginState>,
    factory: Arc<MessageFactory>,
    table: Arc<DispatchTable>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let (conn, read_half) = establish(stream, peer);
    tracing::info!("[login] [connect] conn={} addr={}", conn.id(), peer);

    let hello = HelloConnectMessage {
        salt: random_token(SALT_LEN),
        required_version: state.config.version,
    };
    if conn.send(&hello).await.is_err() {
        return;
    }

    let pipeline = InboundPipeline::new(factory, table);
    if let Err(e) = run_read_loop(read_half, Arc::clone(&conn), pipeline).await {
        tracing::warn!("[login] [session_error] conn={} err={}", conn.id(), e);
    }

    conn.close();
    state.identified.lock().await.remove(&conn.id());
    tracing::info!("[login] [disconnect] conn={}", conn.id());
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_config() -> ServerConfig {
        ServerConfig::from_str(
            r#"
login_ip: 127.0.0.1
game_ip: 127.0.0.1
game_port: 7777
world_id: 1
version: 129
accounts:
  - account: morgane
    password: hunter2
    nickname: Morg
    admin: true
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_state_indexes_accounts() {
        let state = LoginState::new(test_config());
        assert!(state.account("morgane").is_some());
        assert!(state.account("nobody").is_none());
    }

    #[test]
    fn test_dispatch_table_covers_client_messages() {
        let state = Arc::new(LoginState::new(test_config()));
        let table = LoginState::dispatch_table(&state);
        assert!(table.handles::<IdentificationMessage>());
        assert!(table.handles::<WorldSelectionMessage>());
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token(TICKET_LEN);
        assert_eq!(token.len(), TICKET_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, random_token(TICKET_LEN));
    }
}
