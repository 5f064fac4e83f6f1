//! The RTC engine seam.
//!
//! Everything below a session (codec negotiation, SDP, ICE, DTLS, SCTP)
//! lives behind [`Engine`] and [`PeerEngine`]. The session only issues
//! commands and observes results and [`EngineSignal`]s.

#[cfg(test)]
pub(crate) mod scripted;
pub mod webrtc_rs;

use std::future::Future;
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::error::EngineError;

/// Channel on which an engine peer reports events it produced on its own.
pub type SignalSender = mpsc::UnboundedSender<EngineSignal>;

/// Factory for the composable pieces of an RTC stack.
pub trait Engine: Send + Sync + 'static {
    /// Codec and header-extension configuration.
    type MediaEngine: Send + Sync + 'static;
    /// RTP/RTCP interceptor pipeline.
    type Registry: Send + Sync + 'static;
    /// Immutable builder for peer connections.
    type Api: Send + Sync + 'static;
    type Peer: PeerEngine;

    fn new_media_engine(&self) -> Result<Self::MediaEngine, EngineError>;

    /// Build a registry against `media_engine`, which may be adjusted but
    /// stays owned by the caller.
    fn new_registry(
        &self,
        media_engine: &mut Self::MediaEngine,
    ) -> Result<Self::Registry, EngineError>;

    fn new_api(&self, media_engine: Self::MediaEngine, registry: Self::Registry) -> Self::Api;

    /// Create a live peer connection that reports candidates and link state
    /// changes on `signals`.
    fn new_peer(
        &self,
        api: &Self::Api,
        config: &SessionConfig,
        signals: SignalSender,
    ) -> impl Future<Output = Result<Self::Peer, EngineError>> + Send;
}

/// One native peer connection.
pub trait PeerEngine: Send + Sync + 'static {
    fn create_offer(&self) -> impl Future<Output = Result<SessionDescription, EngineError>> + Send;

    fn create_answer(&self)
    -> impl Future<Output = Result<SessionDescription, EngineError>> + Send;

    fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn create_data_channel(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn add_ice_candidate(
        &self,
        candidate: IceCandidate,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn close(&self) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Role of a session description in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
}

/// An SDP blob and its role. The SDP text itself is never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn pranswer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Pranswer,
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate in its signaling form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

/// Transport-level connection state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events a peer produces without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// A local candidate was gathered.
    Candidate(IceCandidate),
    /// Local candidate gathering finished.
    GatheringComplete,
    Link(LinkState),
}
