//! Game server: speaks the game namespace.
//!
//! A client authenticates with the ticket issued by the login server,
//! gets a player session, and from then on exchanges chat, emote,
//! movement and heartbeat traffic. Session entries are keyed by
//! connection id; the per-connection dispatch ordering means a session's
//! own handlers never race each other.

pub mod handlers;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::network::{
    establish, run_read_loop, DispatchTable, DispatchTableBuilder, InboundPipeline,
};
use crate::protocol::factory::MessageFactory;
use crate::protocol::messages::game::{
    self, AuthenticationTicketMessage, ChatClientMessage, ChatClientPrivateMessage,
    EmotePlayRequestMessage, HeartbeatMessage, MapMovementRequestMessage,
};

/// Map every fresh character spawns on.
pub const START_MAP_ID: u32 = 7411;
/// Cell they spawn at.
pub const START_CELL: u16 = 311;

/// One authenticated player on this world.
#[derive(Debug)]
pub struct PlayerSession {
    pub nickname: String,
    pub actor_id: u64,
    pub map_id: u32,
    pub cell: u16,
    pub last_activity: Instant,
}

pub struct GameState {
    pub config: ServerConfig,
    /// conn id → session, created on ticket acceptance
    pub sessions: Mutex<HashMap<u32, PlayerSession>>,
    next_actor_id: AtomicU64,
}

impl GameState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            next_actor_id: AtomicU64::new(1),
        }
    }

    pub fn allocate_actor_id(&self) -> u64 {
        self.next_actor_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Builds the immutable handler table for this server.
    pub fn dispatch_table(state: &Arc<Self>) -> DispatchTable {
        let auth = Arc::clone(state);
        let beat = Arc::clone(state);
        let chat = Arc::clone(state);
        let whisper = Arc::clone(state);
        let emote = Arc::clone(state);
        let movement = Arc::clone(state);
        DispatchTableBuilder::new()
            .on::<AuthenticationTicketMessage, _, _>(move |conn, msg| {
                handlers::authentication_ticket(Arc::clone(&auth), conn, msg)
            })
            .on::<HeartbeatMessage, _, _>(move |conn, msg| {
                handlers::heartbeat(Arc::clone(&beat), conn, msg)
            })
            .on::<ChatClientMessage, _, _>(move |conn, msg| {
                handlers::chat(Arc::clone(&chat), conn, msg)
            })
            .on::<ChatClientPrivateMessage, _, _>(move |conn, msg| {
                handlers::chat_private(Arc::clone(&whisper), conn, msg)
            })
            .on::<EmotePlayRequestMessage, _, _>(move |conn, msg| {
                handlers::emote(Arc::clone(&emote), conn, msg)
            })
            .on::<MapMovementRequestMessage, _, _>(move |conn, msg| {
                handlers::map_movement(Arc::clone(&movement), conn, msg)
            })
            .build()
    }

    pub async fn run(state: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!("[game] [ready] addr={}", listener.local_addr()?);
        Self::serve(state, listener).await
    }

    /// Accept loop over an already-bound listener (tests bind port 0).
    pub async fn serve(state: Arc<Self>, listener: TcpListener) -> Result<()> {
        let factory = Arc::new(game::factory());
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

/// Seconds since the epoch, as stamped into chat frames.
pub fn unix_now() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i32)
        .unwrap_or(0)
}

async fn handle_client(
    state: Arc<GameState>,
    factory: Arc<MessageFactory>,
    table: Arc<DispatchTable>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let (conn, read_half) = establish(stream, peer);
    tracing::info!("[game] [connect] conn={} addr={}", conn.id(), peer);

    let pipeline = InboundPipeline::new(factory, table);
    if let Err(e) = run_read_loop(read_half, Arc::clone(&conn), pipeline).await {
        tracing::warn!("[game] [session_error] conn={} err={}", conn.id(), e);
    }

    conn.close();
    if let Some(session) = state.sessions.lock().await.remove(&conn.id()) {
        tracing::info!(
            "[game] [logout] conn={} nickname={}",
            conn.id(),
            session.nickname
        );
    }
    tracing::info!("[game] [disconnect] conn={}", conn.id());
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_config() -> ServerConfig {
        ServerConfig::from_str(
            r#"
login_ip: 127.0.0.1
game_ip: 127.0.0.1
motd: "welcome to the test world"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_actor_ids_increase() {
        let state = GameState::new(test_config());
        let a = state.allocate_actor_id();
        let b = state.allocate_actor_id();
        assert!(b > a);
    }

    #[test]
    fn test_dispatch_table_covers_client_messages() {
        let state = Arc::new(GameState::new(test_config()));
        let table = GameState::dispatch_table(&state);
        assert!(table.handles::<AuthenticationTicketMessage>());
        assert!(table.handles::<HeartbeatMessage>());
        assert!(table.handles::<ChatClientMessage>());
        assert!(table.handles::<ChatClientPrivateMessage>());
        assert!(table.handles::<EmotePlayRequestMessage>());
        assert!(table.handles::<MapMovementRequestMessage>());
    }

    #[test]
    fn test_unix_now_is_after_2020() {
        assert!(unix_now() > 1_577_836_800);
    }
}
