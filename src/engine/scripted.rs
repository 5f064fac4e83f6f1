//! An in-process engine with predictable behavior, for session tests.

use std::future::pending;
use std::sync::Mutex;

use crate::config::SessionConfig;
use crate::engine::{
    Engine, EngineSignal, IceCandidate, LinkState, PeerEngine, SdpKind, SessionDescription,
    SignalSender,
};
use crate::error::EngineError;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ScriptedEngine {
    /// Every `new_peer` fails.
    pub(crate) fail_construction: bool,
    /// `create_offer` never completes.
    pub(crate) stall_offers: bool,
    /// The transport fails as soon as a remote description is applied.
    pub(crate) fail_transport: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedMedia {
    pub(crate) interceptors: usize,
}

#[derive(Debug)]
pub(crate) struct ScriptedRegistry;

#[derive(Debug)]
pub(crate) struct ScriptedApi {
    pub(crate) interceptors: usize,
}

impl Engine for ScriptedEngine {
    type MediaEngine = ScriptedMedia;
    type Registry = ScriptedRegistry;
    type Api = ScriptedApi;
    type Peer = ScriptedPeer;

    fn new_media_engine(&self) -> Result<ScriptedMedia, EngineError> {
        Ok(ScriptedMedia::default())
    }

    fn new_registry(&self, media: &mut ScriptedMedia) -> Result<ScriptedRegistry, EngineError> {
        media.interceptors += 1;
        Ok(ScriptedRegistry)
    }

    fn new_api(&self, media: ScriptedMedia, _registry: ScriptedRegistry) -> ScriptedApi {
        ScriptedApi {
            interceptors: media.interceptors,
        }
    }

    async fn new_peer(
        &self,
        _api: &ScriptedApi,
        _config: &SessionConfig,
        signals: SignalSender,
    ) -> Result<ScriptedPeer, EngineError> {
        if self.fail_construction {
            return Err(EngineError::Construction("scripted failure".to_string()));
        }
        Ok(ScriptedPeer {
            signals,
            stall_offers: self.stall_offers,
            fail_transport: self.fail_transport,
            sides: Mutex::new(Sides::default()),
        })
    }
}

#[derive(Debug, Default)]
struct Sides {
    local: Option<SdpKind>,
    remote: Option<SdpKind>,
    channels: Vec<String>,
}

pub(crate) struct ScriptedPeer {
    signals: SignalSender,
    stall_offers: bool,
    fail_transport: bool,
    sides: Mutex<Sides>,
}

impl ScriptedPeer {
    fn signal(&self, signal: EngineSignal) {
        let _ = self.signals.send(signal);
    }

    fn sdp(&self, kind: &str) -> String {
        let sides = self.sides.lock().unwrap();
        let mut sdp = format!("v=0\r\ns=scripted-{kind}\r\n");
        for label in &sides.channels {
            sdp.push_str(&format!("m=application 9 label:{label}\r\n"));
        }
        sdp
    }

    fn both_set(&self) -> bool {
        let sides = self.sides.lock().unwrap();
        sides.local.is_some() && sides.remote.is_some()
    }
}

impl PeerEngine for ScriptedPeer {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        if self.stall_offers {
            pending::<()>().await;
        }
        Ok(SessionDescription::offer(self.sdp("offer")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        if self.sides.lock().unwrap().remote != Some(SdpKind::Offer) {
            return Err(EngineError::Negotiation(
                "no remote offer to answer".to_string(),
            ));
        }
        Ok(SessionDescription::answer(self.sdp("answer")))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.sides.lock().unwrap().local = Some(description.kind);
        self.signal(EngineSignal::Candidate(IceCandidate {
            candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        }));
        self.signal(EngineSignal::GatheringComplete);
        if self.both_set() {
            self.signal(EngineSignal::Link(LinkState::Connected));
        }
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        if description.sdp.is_empty() {
            return Err(EngineError::Description("empty sdp".to_string()));
        }
        self.sides.lock().unwrap().remote = Some(description.kind);
        if self.fail_transport {
            self.signal(EngineSignal::Link(LinkState::Failed));
        } else if self.both_set() {
            self.signal(EngineSignal::Link(LinkState::Connected));
        }
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), EngineError> {
        if label.is_empty() {
            return Err(EngineError::DataChannel("empty label".to_string()));
        }
        self.sides.lock().unwrap().channels.push(label.to_string());
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<(), EngineError> {
        if self.sides.lock().unwrap().remote.is_none() {
            return Err(EngineError::Candidate(
                "remote description not set".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.signal(EngineSignal::Link(LinkState::Closed));
        Ok(())
    }
}
