//! Connection-setup handlers.
//!
//! Each runs to completion before the next frame on the same connection
//! is decoded, so the `identified` map sees at most one writer per
//! connection at a time.

use std::sync::Arc;

use anyhow::Result;

use super::{random_token, LoginState, TICKET_LEN};
use crate::network::Connection;
use crate::protocol::messages::connect::{
    IdentificationFailedMessage, IdentificationMessage, IdentificationSuccessMessage,
    WorldAddressMessage, WorldSelectionMessage, ID_FAIL_BAD_VERSION, ID_FAIL_WRONG_CREDENTIALS,
};

pub async fn identification(
    state: Arc<LoginState>,
    conn: Arc<Connection>,
    msg: IdentificationMessage,
) -> Result<()> {
    if msg.version != state.config.version {
        tracing::info!(
            "[login] [bad_version] conn={} got={} want={}",
            conn.id(),
            msg.version,
            state.config.version
        );
        conn.send(&IdentificationFailedMessage {
            reason: ID_FAIL_BAD_VERSION,
        })
        .await?;
        return Ok(());
    }

    let entry = match state.account(&msg.account) {
        Some(entry) if entry.password == msg.password => entry.clone(),
        _ => {
            tracing::info!(
                "[login] [auth_failed] conn={} account={}",
                conn.id(),
                msg.account
            );
            conn.send(&IdentificationFailedMessage {
                reason: ID_FAIL_WRONG_CREDENTIALS,
            })
            .await?;
            return Ok(());
        }
    };

    state
        .identified
        .lock()
        .await
        .insert(conn.id(), entry.account.clone());
    tracing::info!(
        "[login] [identified] conn={} account={}",
        conn.id(),
        entry.account
    );

    conn.send(&IdentificationSuccessMessage {
        account: entry.account,
        nickname: entry.nickname,
        has_admin_rights: entry.admin,
    })
    .await?;
    Ok(())
}

pub async fn world_selection(
    state: Arc<LoginState>,
    conn: Arc<Connection>,
    msg: WorldSelectionMessage,
) -> Result<()> {
    let account = state.identified.lock().await.get(&conn.id()).cloned();
    let Some(account) = account else {
        tracing::warn!(
            "[login] [world_before_identify] conn={} world={}",
            conn.id(),
            msg.world_id
        );
        return Ok(());
    };

    if msg.world_id != state.config.world_id {
        tracing::warn!(
            "[login] [unknown_world] conn={} world={}",
            conn.id(),
            msg.world_id
        );
        return Ok(());
    }

    let ticket = random_token(TICKET_LEN);
    tracing::info!(
        "[login] [world_selected] conn={} account={} world={}",
        conn.id(),
        account,
        msg.world_id
    );

    conn.send(&WorldAddressMessage {
        address: state.config.game_ip.clone(),
        port: state.config.game_port,
        ticket,
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{decode, DecodeOutcome};
    use crate::protocol::messages::connect;
    use crate::servers::login::tests::test_config;
    use tokio::sync::mpsc;

    fn new_conn() -> (Arc<Connection>, mpsc::Receiver<Vec<u8>>) {
        Connection::new("127.0.0.1:1".parse().unwrap())
    }

    async fn next_reply(rx: &mut mpsc::Receiver<Vec<u8>>) -> Box<dyn crate::protocol::Message> {
        let bytes = rx.recv().await.expect("a reply frame");
        match decode(&bytes, &connect::factory()).unwrap() {
            DecodeOutcome::Frame { message, .. } => message,
            _ => panic!("reply was not a complete frame"),
        }
    }

    fn state() -> Arc<LoginState> {
        Arc::new(LoginState::new(test_config()))
    }

    #[tokio::test]
    async fn test_identification_version_gate() {
        let (conn, mut rx) = new_conn();
        identification(
            state(),
            Arc::clone(&conn),
            IdentificationMessage {
                version: 9,
                account: "morgane".into(),
                password: "hunter2".into(),
            },
        )
        .await
        .unwrap();

        let reply = next_reply(&mut rx).await;
        let failed = reply
            .as_any()
            .downcast_ref::<IdentificationFailedMessage>()
            .unwrap();
        assert_eq!(failed.reason, ID_FAIL_BAD_VERSION);
    }

    #[tokio::test]
    async fn test_identification_wrong_password() {
        let (conn, mut rx) = new_conn();
        identification(
            state(),
            Arc::clone(&conn),
            IdentificationMessage {
                version: 129,
                account: "morgane".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap();

        let reply = next_reply(&mut rx).await;
        let failed = reply
            .as_any()
            .downcast_ref::<IdentificationFailedMessage>()
            .unwrap();
        assert_eq!(failed.reason, ID_FAIL_WRONG_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_identification_success_records_session() {
        let st = state();
        let (conn, mut rx) = new_conn();
        identification(
            Arc::clone(&st),
            Arc::clone(&conn),
            IdentificationMessage {
                version: 129,
                account: "morgane".into(),
                password: "hunter2".into(),
            },
        )
        .await
        .unwrap();

        let reply = next_reply(&mut rx).await;
        let ok = reply
            .as_any()
            .downcast_ref::<IdentificationSuccessMessage>()
            .unwrap();
        assert_eq!(ok.nickname, "Morg");
        assert!(ok.has_admin_rights);
        assert_eq!(
            st.identified.lock().await.get(&conn.id()),
            Some(&"morgane".to_string())
        );
    }

    #[tokio::test]
    async fn test_world_selection_requires_identification() {
        let (conn, mut rx) = new_conn();
        world_selection(
            state(),
            Arc::clone(&conn),
            WorldSelectionMessage { world_id: 1 },
        )
        .await
        .unwrap();
        // no reply at all for unidentified clients
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_world_selection_returns_address_and_ticket() {
        let st = state();
        let (conn, mut rx) = new_conn();
        st.identified.lock().await.insert(conn.id(), "morgane".into());

        world_selection(
            Arc::clone(&st),
            Arc::clone(&conn),
            WorldSelectionMessage { world_id: 1 },
        )
        .await
        .unwrap();

        let reply = next_reply(&mut rx).await;
        let addr = reply
            .as_any()
            .downcast_ref::<WorldAddressMessage>()
            .unwrap();
        assert_eq!(addr.address, "127.0.0.1");
        assert_eq!(addr.port, 7777);
        assert_eq!(addr.ticket.len(), TICKET_LEN);
    }
}
