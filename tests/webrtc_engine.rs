use std::time::Duration;

use specter::{
    EntityId, Notification, NotificationKind, Notifications, Payload, SdpKind, Session,
    SessionConfig, WebRtcEngine,
};

const WAIT: Duration = Duration::from_secs(10);

async fn next_for(notifications: &mut Notifications, id: &EntityId) -> Notification {
    loop {
        let notification = tokio::time::timeout(WAIT, notifications.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("notification channel closed");
        if &notification.entity_id == id {
            return notification;
        }
    }
}

/// Skip candidate traffic, which depends on the host's interfaces.
async fn next_command_result(notifications: &mut Notifications, id: &EntityId) -> Notification {
    loop {
        let notification = next_for(notifications, id).await;
        if !matches!(
            notification.kind,
            NotificationKind::IceCandidate | NotificationKind::IceGatheringComplete
        ) {
            return notification;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_offer_with_data_channel() {
    let (session, mut notifications) =
        Session::init(WebRtcEngine, SessionConfig::default()).unwrap();

    let media_engine = session.new_media_engine().unwrap();
    let registry = session.new_registry(&media_engine).unwrap();
    let api = session.new_api(&media_engine, &registry).unwrap();
    assert!(!session.media_engine_exists(&media_engine).unwrap());
    assert!(!session.registry_exists(&registry).unwrap());

    let peer = session.new_peer_connection(&api).unwrap();
    let ready = next_for(&mut notifications, &peer).await;
    assert_eq!(ready.kind, NotificationKind::PeerConnectionReady);
    assert!(ready.is_ok(), "{:?}", ready.result);

    let channel = session.create_data_channel(&peer, "chat").unwrap();
    session.create_offer(&peer).unwrap();

    let created = next_command_result(&mut notifications, &peer).await;
    assert_eq!(
        created.result,
        Ok(Payload::DataChannel {
            channel,
            label: "chat".to_string()
        })
    );

    let offer = next_command_result(&mut notifications, &peer).await;
    assert_eq!(offer.kind, NotificationKind::Offer);
    let offer = offer.description().cloned().expect("offer carries a description");
    assert_eq!(offer.kind, SdpKind::Offer);
    assert!(offer.sdp.contains("m=application"));

    session.set_local_description(&peer, offer).unwrap();
    let local = next_command_result(&mut notifications, &peer).await;
    assert_eq!(local.kind, NotificationKind::SetLocalDescription);
    assert!(local.is_ok(), "{:?}", local.result);

    session.close(&peer).unwrap();
    let closed = next_command_result(&mut notifications, &peer).await;
    assert_eq!(closed.kind, NotificationKind::PeerConnectionClosed);
    assert!(!session.peer_connection_exists(&peer).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_remote_description_is_reported() {
    let (session, mut notifications) =
        Session::init(WebRtcEngine, SessionConfig::default()).unwrap();
    let media_engine = session.new_media_engine().unwrap();
    let registry = session.new_registry(&media_engine).unwrap();
    let api = session.new_api(&media_engine, &registry).unwrap();
    let peer = session.new_peer_connection(&api).unwrap();
    next_for(&mut notifications, &peer).await;

    session
        .set_remote_description(&peer, specter::SessionDescription::offer("not sdp"))
        .unwrap();

    let remote = next_command_result(&mut notifications, &peer).await;
    assert_eq!(remote.kind, NotificationKind::SetRemoteDescription);
    assert!(remote.result.is_err());
    assert_eq!(
        session.peer_connection_state(&peer).unwrap(),
        Some(specter::NegotiationState::Negotiating {
            local_set: false,
            remote_set: false
        })
    );

    session.close(&peer).unwrap();
}
