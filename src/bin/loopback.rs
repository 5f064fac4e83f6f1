use std::time::Duration;

use anyhow::{Context, Result, bail};
use specter::{
    EntityId, NegotiationState, NotificationKind, Notifications, Payload, Session, SessionConfig,
    WebRtcEngine,
};
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("ICE_SERVERS") {
        Ok(uris) => SessionConfig::from_uris(
            uris.split(',').map(str::trim).filter(|uri| !uri.is_empty()),
        )?,
        Err(_) => SessionConfig::default(),
    };

    let (session, mut notifications) = Session::init(WebRtcEngine, config)?;
    println!("ICE servers:");
    for server in &session.config().ice_servers {
        println!("  {server}");
    }

    let media_engine = session.new_media_engine()?;
    let registry = session.new_registry(&media_engine)?;
    let api = session.new_api(&media_engine, &registry)?;

    let caller = session.new_peer_connection(&api)?;
    let callee = session.new_peer_connection(&api)?;
    println!("Caller {caller}, callee {callee}");

    timeout(
        NEGOTIATION_TIMEOUT,
        negotiate(&session, &mut notifications, &caller, &callee),
    )
    .await
    .context("negotiation timed out")??;

    println!("Loopback finished");
    Ok(())
}

/// Drive both peers through offer/answer and candidate exchange, then close
/// them once connected.
async fn negotiate(
    session: &Session<WebRtcEngine>,
    notifications: &mut Notifications,
    caller: &EntityId,
    callee: &EntityId,
) -> Result<()> {
    let other = |id: &EntityId| if id == caller { callee } else { caller };
    let mut ready = 0;
    let mut connected = 0;
    let mut closed = 0;

    while let Some(notification) = notifications.recv().await {
        let id = notification.entity_id;
        println!("{id} {}", notification.kind);

        let payload = match notification.result {
            Ok(payload) => payload,
            Err(e) => {
                warn!(peer = %id, kind = %notification.kind, error = %e, "Operation failed");
                if notification.kind == NotificationKind::PeerConnectionReady {
                    bail!("peer connection {id} could not be created: {e}");
                }
                continue;
            }
        };

        match (notification.kind, payload) {
            (NotificationKind::PeerConnectionReady, _) => {
                ready += 1;
                if ready == 2 {
                    session.create_data_channel(caller, "chat")?;
                    session.create_offer(caller)?;
                }
            }
            (NotificationKind::Offer, Payload::Description(offer)) => {
                session.set_local_description(caller, offer.clone())?;
                session.set_remote_description(callee, offer)?;
                session.create_answer(callee)?;
            }
            (NotificationKind::Answer, Payload::Description(answer)) => {
                session.set_local_description(callee, answer.clone())?;
                session.set_remote_description(caller, answer)?;
            }
            (NotificationKind::IceCandidate, Payload::Candidate(candidate)) => {
                session.add_ice_candidate(other(&id), candidate)?;
            }
            (NotificationKind::DataChannelCreated, Payload::DataChannel { label, .. }) => {
                info!(peer = %id, label = %label, "Data channel ready");
            }
            (NotificationKind::ConnectionState, Payload::State(NegotiationState::Connected)) => {
                connected += 1;
                if connected == 2 {
                    println!("Both peers connected, closing");
                    session.close(caller)?;
                    session.close(callee)?;
                }
            }
            (NotificationKind::PeerConnectionClosed, _) => {
                closed += 1;
                if closed == 2 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    bail!("notification stream ended early")
}
