//! Delivery of asynchronous results to the session owner.
//!
//! A session has exactly one [`Notifications`] receiver, handed out once by
//! [`Session::init`](crate::Session::init). Producers never block: the
//! channel is unbounded, and a send only fails when the owner is gone.

use entity_store::EntityId;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::error;

use crate::engine::{IceCandidate, SessionDescription};
use crate::error::{BridgeError, EngineError};
use crate::peer::NegotiationState;

/// What a notification reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    PeerConnectionReady,
    DataChannelCreated,
    Offer,
    Answer,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    IceCandidate,
    IceGatheringComplete,
    ConnectionState,
    PeerConnectionClosed,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::PeerConnectionReady => "peer_connection_ready",
            NotificationKind::DataChannelCreated => "data_channel_created",
            NotificationKind::Offer => "offer",
            NotificationKind::Answer => "answer",
            NotificationKind::SetLocalDescription => "set_local_description",
            NotificationKind::SetRemoteDescription => "set_remote_description",
            NotificationKind::AddIceCandidate => "add_ice_candidate",
            NotificationKind::IceCandidate => "ice_candidate",
            NotificationKind::IceGatheringComplete => "ice_gathering_complete",
            NotificationKind::ConnectionState => "connection_state",
            NotificationKind::PeerConnectionClosed => "peer_connection_closed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success payload of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The operation completed and has nothing to report.
    Ack,
    Description(SessionDescription),
    DataChannel { channel: EntityId, label: String },
    Candidate(IceCandidate),
    State(NegotiationState),
}

/// The outcome of one asynchronous operation on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub entity_id: EntityId,
    pub result: Result<Payload, EngineError>,
}

impl Notification {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The session description carried by an `offer` or `answer`.
    pub fn description(&self) -> Option<&SessionDescription> {
        match &self.result {
            Ok(Payload::Description(description)) => Some(description),
            _ => None,
        }
    }
}

/// The producing side, shared by the session and every connection worker.
#[derive(Debug, Clone)]
pub(crate) struct Bridge {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Bridge {
    pub(crate) fn new() -> (Self, Notifications) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, Notifications { rx })
    }

    /// Queue a notification for the owner.
    pub(crate) fn deliver(&self, notification: Notification) -> Result<(), BridgeError> {
        let kind = notification.kind;
        self.tx.send(notification).map_err(|rejected| {
            error!(
                kind = %kind,
                entity = %rejected.0.entity_id,
                "Notification owner is gone, notification undeliverable"
            );
            BridgeError::OwnerGone
        })
    }

    /// Whether the owner dropped its receiver.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The owner's receiving side.
///
/// Notifications for one peer connection arrive in the order their
/// operations were issued; notifications for different connections may
/// interleave arbitrarily.
#[derive(Debug)]
pub struct Notifications {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Notifications {
    /// Wait for the next notification. Returns `None` once the session and
    /// every connection worker are gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Take a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Notifications {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
