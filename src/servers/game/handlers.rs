//! Game handlers.
//!
//! Every handler except ticket authentication starts by looking up the
//! connection's session; traffic from unauthenticated connections is
//! logged and dropped. The per-connection ordering guarantee makes the
//! session read-modify-write below safe without extra coordination: no
//! two handlers for the same connection ever overlap.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use super::{unix_now, GameState, PlayerSession, START_CELL, START_MAP_ID};
use crate::network::Connection;
use crate::protocol::messages::game::{
    AuthenticationTicketAcceptedMessage, AuthenticationTicketMessage,
    AuthenticationTicketRefusedMessage, CharacterStatsMessage, ChatClientMessage,
    ChatClientPrivateMessage, ChatServerCopyMessage, ChatServerMessage, EmotePlayMessage,
    EmotePlayRequestMessage, HeartbeatMessage, MapMovementMessage, MapMovementRequestMessage,
};

/// System/server announcements channel.
pub const CHANNEL_SYSTEM: u8 = 0;

/// Refusal reason: ticket unreadable or of the wrong shape.
pub const TICKET_REFUSED_INVALID: u8 = 1;

/// The login server issues fixed-length alphanumeric tickets. The
/// cross-process handoff is outside this emulator, so shape is all the
/// game server can check.
fn ticket_is_plausible(ticket: &str) -> bool {
    ticket.len() >= 8 && ticket.chars().all(|c| c.is_ascii_alphanumeric())
}

pub async fn authentication_ticket(
    state: Arc<GameState>,
    conn: Arc<Connection>,
    msg: AuthenticationTicketMessage,
) -> Result<()> {
    if !ticket_is_plausible(&msg.ticket) {
        tracing::info!("[game] [ticket_refused] conn={}", conn.id());
        conn.send(&AuthenticationTicketRefusedMessage {
            reason: TICKET_REFUSED_INVALID,
        })
        .await?;
        conn.close();
        return Ok(());
    }

    let actor_id = state.allocate_actor_id();
    let nickname = format!("Adventurer{actor_id}");
    state.sessions.lock().await.insert(
        conn.id(),
        PlayerSession {
            nickname: nickname.clone(),
            actor_id,
            map_id: START_MAP_ID,
            cell: START_CELL,
            last_activity: Instant::now(),
        },
    );
    tracing::info!(
        "[game] [login] conn={} actor={} nickname={}",
        conn.id(),
        actor_id,
        nickname
    );

    conn.send(&AuthenticationTicketAcceptedMessage).await?;
    conn.send(&CharacterStatsMessage {
        level: 1,
        experience: 0.0,
        health: 50,
        alive: true,
    })
    .await?;

    if !state.config.motd.is_empty() {
        conn.send(&ChatServerMessage {
            channel: CHANNEL_SYSTEM,
            content: state.config.motd.clone(),
            timestamp: unix_now(),
            sender_id: 0,
            sender_name: String::new(),
        })
        .await?;
    }
    Ok(())
}

pub async fn heartbeat(
    state: Arc<GameState>,
    conn: Arc<Connection>,
    _msg: HeartbeatMessage,
) -> Result<()> {
    if let Some(session) = state.sessions.lock().await.get_mut(&conn.id()) {
        session.last_activity = Instant::now();
    }
    conn.send(&HeartbeatMessage).await?;
    Ok(())
}

pub async fn chat(
    state: Arc<GameState>,
    conn: Arc<Connection>,
    msg: ChatClientMessage,
) -> Result<()> {
    let Some(stamped) = stamp_chat(&state, &conn, &msg).await else {
        return Ok(());
    };
    conn.send(&stamped).await?;
    Ok(())
}

pub async fn chat_private(
    state: Arc<GameState>,
    conn: Arc<Connection>,
    msg: ChatClientPrivateMessage,
) -> Result<()> {
    let Some(stamped) = stamp_chat(&state, &conn, &msg.base).await else {
        return Ok(());
    };
    // the author gets their own copy of the whisper back
    conn.send(&ChatServerCopyMessage {
        base: stamped,
        receiver_name: msg.receiver,
    })
    .await?;
    Ok(())
}

/// Turns a client chat line into the server-stamped form, or `None` if
/// the connection has no session yet.
async fn stamp_chat(
    state: &GameState,
    conn: &Connection,
    msg: &ChatClientMessage,
) -> Option<ChatServerMessage> {
    let sessions = state.sessions.lock().await;
    let Some(session) = sessions.get(&conn.id()) else {
        tracing::warn!("[game] [chat_without_session] conn={}", conn.id());
        return None;
    };
    Some(ChatServerMessage {
        channel: msg.channel,
        content: msg.content.clone(),
        timestamp: unix_now(),
        sender_id: session.actor_id,
        sender_name: session.nickname.clone(),
    })
}

pub async fn emote(
    state: Arc<GameState>,
    conn: Arc<Connection>,
    msg: EmotePlayRequestMessage,
) -> Result<()> {
    let actor_id = {
        let sessions = state.sessions.lock().await;
        let Some(session) = sessions.get(&conn.id()) else {
            tracing::warn!("[game] [emote_without_session] conn={}", conn.id());
            return Ok(());
        };
        session.actor_id
    };
    conn.send(&EmotePlayMessage {
        actor_id,
        emote_id: msg.emote_id,
    })
    .await?;
    Ok(())
}

pub async fn map_movement(
    state: Arc<GameState>,
    conn: Arc<Connection>,
    msg: MapMovementRequestMessage,
) -> Result<()> {
    let Some(&last_cell) = msg.key_cells.last() else {
        tracing::warn!("[game] [empty_path] conn={}", conn.id());
        return Ok(());
    };

    let actor_id = {
        let mut sessions = state.sessions.lock().await;
        let Some(session) = sessions.get_mut(&conn.id()) else {
            tracing::warn!("[game] [move_without_session] conn={}", conn.id());
            return Ok(());
        };
        session.map_id = msg.map_id;
        session.cell = last_cell;
        session.last_activity = Instant::now();
        session.actor_id
    };

    conn.send(&MapMovementMessage {
        actor_id,
        key_cells: msg.key_cells,
    })
    .await?;
    Ok(())
}
