use std::sync::{Arc, Weak};

use entity_store::EntityId;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, Notification, NotificationKind, Payload};
use crate::engine::{
    Engine, EngineSignal, IceCandidate, LinkState, PeerEngine, SessionDescription, SignalSender,
};
use crate::entity::EntityKind;
use crate::error::{BridgeError, EngineError};
use crate::peer::{DataChannelState, PeerRecord};
use crate::session::Shared;

/// Work queued for a connection's worker, in issue order.
#[derive(Debug)]
pub(crate) enum PeerCommand {
    CreateDataChannel { channel: EntityId, label: String },
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SessionDescription),
    SetRemoteDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
}

impl PeerCommand {
    fn kind(&self) -> NotificationKind {
        match self {
            PeerCommand::CreateDataChannel { .. } => NotificationKind::DataChannelCreated,
            PeerCommand::CreateOffer => NotificationKind::Offer,
            PeerCommand::CreateAnswer => NotificationKind::Answer,
            PeerCommand::SetLocalDescription(_) => NotificationKind::SetLocalDescription,
            PeerCommand::SetRemoteDescription(_) => NotificationKind::SetRemoteDescription,
            PeerCommand::AddIceCandidate(_) => NotificationKind::AddIceCandidate,
        }
    }
}

/// Record change to apply once an operation has succeeded or failed.
enum Effect {
    None,
    LocalApplied,
    RemoteApplied,
    ChannelCreated(EntityId),
    ChannelFailed(EntityId),
}

type Outcome = (NotificationKind, Result<Payload, EngineError>, Effect);

/// The task that owns one native peer connection.
///
/// It is the only producer of notifications for its connection: commands run
/// one at a time in the order they were accepted, engine signals are
/// forwarded between them, and `peer_connection_closed` is sent last.
pub(crate) struct PeerWorker<E: Engine> {
    context: PeerContext<E>,
    api: Arc<E::Api>,
    queue: mpsc::UnboundedReceiver<PeerCommand>,
    closing: watch::Receiver<bool>,
}

impl<E: Engine> PeerWorker<E> {
    pub(crate) fn new(
        id: EntityId,
        shared: Weak<Shared<E>>,
        bridge: Bridge,
        api: Arc<E::Api>,
        queue: mpsc::UnboundedReceiver<PeerCommand>,
        closing: watch::Receiver<bool>,
    ) -> Self {
        Self {
            context: PeerContext { id, shared, bridge },
            api,
            queue,
            closing,
        }
    }

    pub(crate) async fn run(self) {
        let PeerWorker {
            context,
            api,
            mut queue,
            mut closing,
        } = self;
        let (signal_tx, mut signals) = mpsc::unbounded_channel();

        let constructed = tokio::select! {
            biased;
            _ = closed(&mut closing) => None,
            result = context.construct(&api, signal_tx) => Some(result),
        };

        let mut owner_gone = false;
        let peer = match constructed {
            None => None,
            Some(Ok(peer)) => {
                info!(peer = %context.id, "Peer connection ready");
                owner_gone = context
                    .notify(NotificationKind::PeerConnectionReady, Ok(Payload::Ack))
                    .is_err();
                Some(peer)
            }
            Some(Err(e)) => {
                warn!(peer = %context.id, error = %e, "Peer connection construction failed");
                context.update(|record| record.state = record.state.failed());
                owner_gone = context
                    .notify(NotificationKind::PeerConnectionReady, Err(e))
                    .is_err();
                None
            }
        };

        if !owner_gone {
            owner_gone = context
                .serve(peer.as_ref(), &mut queue, &mut signals, &mut closing)
                .await
                .is_err();
        }

        let shutdown = match &peer {
            Some(peer) => peer.close().await,
            None => Ok(()),
        };
        if let Err(e) = &shutdown {
            warn!(peer = %context.id, error = %e, "Native peer connection did not close cleanly");
        }

        context.forget();
        if !owner_gone {
            // nothing is left to report a failure to
            let _ = context.notify(
                NotificationKind::PeerConnectionClosed,
                shutdown.map(|()| Payload::Ack),
            );
        }
        info!(peer = %context.id, "Peer connection closed");
    }
}

/// Resolves once the connection is asked to close or its record is dropped.
async fn closed(closing: &mut watch::Receiver<bool>) {
    // an error means the sender is gone, which is a close as well
    let _ = closing.wait_for(|closing| *closing).await;
}

struct PeerContext<E: Engine> {
    id: EntityId,
    shared: Weak<Shared<E>>,
    bridge: Bridge,
}

impl<E: Engine> PeerContext<E> {
    async fn construct(
        &self,
        api: &E::Api,
        signals: SignalSender,
    ) -> Result<E::Peer, EngineError> {
        let shared = self
            .shared
            .upgrade()
            .ok_or_else(|| EngineError::Construction("session is gone".to_string()))?;
        shared.engine.new_peer(api, &shared.config, signals).await
    }

    /// Process commands and signals until the connection is closed.
    async fn serve(
        &self,
        peer: Option<&E::Peer>,
        queue: &mut mpsc::UnboundedReceiver<PeerCommand>,
        signals: &mut mpsc::UnboundedReceiver<EngineSignal>,
        closing: &mut watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        loop {
            tokio::select! {
                biased;
                _ = closed(closing) => return Ok(()),
                command = queue.recv() => {
                    let Some(command) = command else {
                        return Ok(());
                    };
                    debug!(peer = %self.id, kind = %command.kind(), "Running command");
                    let outcome = tokio::select! {
                        biased;
                        _ = closed(closing) => None,
                        outcome = execute(peer, command) => Some(outcome),
                    };
                    let Some((kind, result, effect)) = outcome else {
                        debug!(peer = %self.id, "In-flight command aborted by close");
                        return Ok(());
                    };
                    self.apply(effect);
                    if let Err(e) = &result {
                        warn!(peer = %self.id, kind = %kind, error = %e, "Engine rejected command");
                    }
                    self.notify(kind, result)?;
                }
                Some(signal) = signals.recv() => self.on_signal(signal)?,
            }
        }
    }

    fn on_signal(&self, signal: EngineSignal) -> Result<(), BridgeError> {
        match signal {
            EngineSignal::Candidate(candidate) => {
                self.update(|record| record.candidates.push(candidate.clone()));
                self.notify(
                    NotificationKind::IceCandidate,
                    Ok(Payload::Candidate(candidate)),
                )
            }
            EngineSignal::GatheringComplete => {
                self.notify(NotificationKind::IceGatheringComplete, Ok(Payload::Ack))
            }
            EngineSignal::Link(LinkState::Connected) => {
                let mut reached = None;
                self.update(|record| {
                    let next = record.state.connected();
                    if next != record.state {
                        record.state = next;
                        reached = Some(next);
                    }
                });
                match reached {
                    Some(state) => {
                        info!(peer = %self.id, "Peer connection established");
                        self.notify(NotificationKind::ConnectionState, Ok(Payload::State(state)))
                    }
                    None => {
                        debug!(peer = %self.id, "Ignoring connected signal outside negotiation");
                        Ok(())
                    }
                }
            }
            EngineSignal::Link(LinkState::Failed) => {
                let mut failed = false;
                self.update(|record| {
                    if !record.state.is_terminal() {
                        record.state = record.state.failed();
                        failed = true;
                    }
                });
                if !failed {
                    return Ok(());
                }
                warn!(peer = %self.id, "Peer connection transport failed");
                self.notify(
                    NotificationKind::ConnectionState,
                    Err(EngineError::Connection("transport failed".to_string())),
                )
            }
            EngineSignal::Link(other) => {
                debug!(peer = %self.id, state = ?other, "Link state changed");
                Ok(())
            }
        }
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::LocalApplied => {
                self.update(|record| record.state = record.state.local_applied());
            }
            Effect::RemoteApplied => {
                self.update(|record| record.state = record.state.remote_applied());
            }
            Effect::ChannelCreated(channel) => {
                self.update(|record| {
                    if let Some(info) = record.data_channels.iter_mut().find(|c| c.id == channel) {
                        info.state = DataChannelState::Created;
                    }
                });
            }
            Effect::ChannelFailed(channel) => {
                self.update(|record| record.data_channels.retain(|c| c.id != channel));
            }
        }
    }

    /// Edit this connection's record, if it still exists.
    fn update(&self, f: impl FnOnce(&mut PeerRecord)) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let edited = shared
            .store
            .with_available_mut(&self.id, EntityKind::PeerConnection, |entity| {
                entity.peer_mut().map(f)
            });
        if let Err(e) = edited {
            debug!(peer = %self.id, error = %e, "Record gone, skipping update");
        }
    }

    /// Drop the record if the session still holds it.
    fn forget(&self) {
        if let Some(shared) = self.shared.upgrade() {
            if let Err(e) = shared.store.remove(&self.id) {
                warn!(peer = %self.id, error = %e, "Failed to remove peer connection record");
            }
        }
    }

    fn notify(
        &self,
        kind: NotificationKind,
        result: Result<Payload, EngineError>,
    ) -> Result<(), BridgeError> {
        self.bridge.deliver(Notification {
            kind,
            entity_id: self.id.clone(),
            result,
        })
    }
}

async fn execute<P: PeerEngine>(peer: Option<&P>, command: PeerCommand) -> Outcome {
    let kind = command.kind();
    let Some(peer) = peer else {
        let effect = match &command {
            PeerCommand::CreateDataChannel { channel, .. } => Effect::ChannelFailed(channel.clone()),
            _ => Effect::None,
        };
        let error = EngineError::Construction("native peer connection was never created".into());
        return (kind, Err(error), effect);
    };

    match command {
        PeerCommand::CreateDataChannel { channel, label } => {
            match peer.create_data_channel(&label).await {
                Ok(()) => (
                    kind,
                    Ok(Payload::DataChannel {
                        channel: channel.clone(),
                        label,
                    }),
                    Effect::ChannelCreated(channel),
                ),
                Err(e) => (kind, Err(e), Effect::ChannelFailed(channel)),
            }
        }
        PeerCommand::CreateOffer => (
            kind,
            peer.create_offer().await.map(Payload::Description),
            Effect::None,
        ),
        PeerCommand::CreateAnswer => (
            kind,
            peer.create_answer().await.map(Payload::Description),
            Effect::None,
        ),
        PeerCommand::SetLocalDescription(description) => settle(
            kind,
            peer.set_local_description(description).await,
            Effect::LocalApplied,
        ),
        PeerCommand::SetRemoteDescription(description) => settle(
            kind,
            peer.set_remote_description(description).await,
            Effect::RemoteApplied,
        ),
        PeerCommand::AddIceCandidate(candidate) => settle(
            kind,
            peer.add_ice_candidate(candidate).await,
            Effect::None,
        ),
    }
}

fn settle(kind: NotificationKind, result: Result<(), EngineError>, effect: Effect) -> Outcome {
    match result {
        Ok(()) => (kind, Ok(Payload::Ack), effect),
        Err(e) => (kind, Err(e), Effect::None),
    }
}
