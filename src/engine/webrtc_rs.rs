use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::config::SessionConfig;
use crate::engine::{
    Engine, EngineSignal, IceCandidate, LinkState, PeerEngine, SdpKind, SessionDescription,
    SignalSender,
};
use crate::error::EngineError;

/// [`Engine`] backed by webrtc-rs with its default codecs and interceptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcEngine;

impl Engine for WebRtcEngine {
    type MediaEngine = MediaEngine;
    type Registry = Registry;
    type Api = API;
    type Peer = WebRtcPeer;

    fn new_media_engine(&self) -> Result<MediaEngine, EngineError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| EngineError::Setup(format!("failed to register codecs: {e}")))?;
        Ok(media_engine)
    }

    fn new_registry(&self, media_engine: &mut MediaEngine) -> Result<Registry, EngineError> {
        register_default_interceptors(Registry::new(), media_engine)
            .map_err(|e| EngineError::Setup(format!("failed to register interceptors: {e}")))
    }

    fn new_api(&self, media_engine: MediaEngine, registry: Registry) -> API {
        APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build()
    }

    async fn new_peer(
        &self,
        api: &API,
        config: &SessionConfig,
        signals: SignalSender,
    ) -> Result<WebRtcPeer, EngineError> {
        let connection = api
            .new_peer_connection(rtc_configuration(config))
            .await
            .map_err(|e| EngineError::Construction(e.to_string()))?;

        let candidate_signals = signals.clone();
        connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signals = candidate_signals.clone();
            Box::pin(async move {
                let signal = match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => EngineSignal::Candidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }),
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize local ICE candidate");
                            return;
                        }
                    },
                    None => EngineSignal::GatheringComplete,
                };
                // the receiver is gone once the connection is closed
                let _ = signals.send(signal);
            })
        }));

        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let signals = signals.clone();
                Box::pin(async move {
                    let link = match state {
                        RTCPeerConnectionState::Connecting => LinkState::Connecting,
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkState::Failed,
                        RTCPeerConnectionState::Closed => LinkState::Closed,
                        other => {
                            debug!(state = ?other, "Ignoring peer connection state");
                            return;
                        }
                    };
                    let _ = signals.send(EngineSignal::Link(link));
                })
            },
        ));

        Ok(WebRtcPeer {
            connection,
            channels: Mutex::new(Vec::new()),
        })
    }
}

/// A webrtc-rs peer connection.
pub struct WebRtcPeer {
    connection: RTCPeerConnection,
    // Data channels are dropped with the peer, not before.
    channels: Mutex<Vec<Arc<RTCDataChannel>>>,
}

impl PeerEngine for WebRtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let offer = self
            .connection
            .create_offer(None)
            .await
            .map_err(|e| EngineError::Negotiation(e.to_string()))?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        let answer = self
            .connection
            .create_answer(None)
            .await
            .map_err(|e| EngineError::Negotiation(e.to_string()))?;
        from_rtc(answer)
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.connection
            .set_local_description(to_rtc(description)?)
            .await
            .map_err(|e| EngineError::Description(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.connection
            .set_remote_description(to_rtc(description)?)
            .await
            .map_err(|e| EngineError::Description(e.to_string()))
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), EngineError> {
        let channel = self
            .connection
            .create_data_channel(label, None)
            .await
            .map_err(|e| EngineError::DataChannel(e.to_string()))?;
        self.channels
            .lock()
            .map_err(|_| EngineError::DataChannel("channel list poisoned".to_string()))?
            .push(channel);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| EngineError::Candidate(e.to_string()))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.connection
            .close()
            .await
            .map_err(|e| EngineError::Close(e.to_string()))
    }
}

fn rtc_configuration(config: &SessionConfig) -> RTCConfiguration {
    let ice_servers = config
        .ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: vec![server.uri()],
            username: server.username.clone(),
            credential: server.credential.clone(),
            ..Default::default()
        })
        .collect();

    RTCConfiguration {
        ice_servers,
        ..Default::default()
    }
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription, EngineError> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        other => {
            return Err(EngineError::Description(format!(
                "unexpected description type {other:?}"
            )));
        }
    };
    Ok(SessionDescription {
        kind,
        sdp: description.sdp,
    })
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    let parsed = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
        SdpKind::Pranswer => RTCSessionDescription::pranswer(description.sdp),
    };
    parsed.map_err(|e| EngineError::Description(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IceServer;

    #[test]
    fn test_rtc_configuration_carries_servers() {
        let config = SessionConfig::default().with_ice_server(
            IceServer::parse("turn:turn.example.com?transport=udp")
                .unwrap()
                .with_credentials("user", "pass"),
        );

        let rtc = rtc_configuration(&config);

        assert_eq!(rtc.ice_servers.len(), 2);
        assert_eq!(rtc.ice_servers[0].urls, vec!["stun:stun.l.google.com:19302"]);
        assert_eq!(
            rtc.ice_servers[1].urls,
            vec!["turn:turn.example.com:3478?transport=udp"]
        );
        assert_eq!(rtc.ice_servers[1].username, "user");
        assert_eq!(rtc.ice_servers[1].credential, "pass");
    }

    #[test]
    fn test_media_engine_and_registry_compose() {
        let engine = WebRtcEngine;
        let mut media_engine = engine.new_media_engine().unwrap();
        let registry = engine.new_registry(&mut media_engine).unwrap();
        let _api = engine.new_api(media_engine, registry);
    }
}
