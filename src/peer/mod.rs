//! Peer connection records and their negotiation state machine.

mod state;
pub(crate) mod worker;

pub use state::{NegotiationState, Operation};

use entity_store::EntityId;
use tokio::sync::{mpsc, watch};

use crate::engine::IceCandidate;
use crate::peer::worker::PeerCommand;

/// Lifecycle of a data channel owned by a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataChannelState {
    /// Accepted, not yet confirmed by the engine.
    Requested,
    Created,
}

/// A data channel as recorded on its peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChannelInfo {
    pub id: EntityId,
    pub label: String,
    pub state: DataChannelState,
}

/// The store's view of one peer connection.
///
/// The native peer itself lives in the connection's worker task; the record
/// only holds what the session needs to validate and enqueue commands.
pub(crate) struct PeerRecord {
    pub(crate) state: NegotiationState,
    pub(crate) data_channels: Vec<DataChannelInfo>,
    pub(crate) candidates: Vec<IceCandidate>,
    commands: mpsc::UnboundedSender<PeerCommand>,
    closing: watch::Sender<bool>,
}

impl PeerRecord {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<PeerCommand>,
        closing: watch::Sender<bool>,
    ) -> Self {
        Self {
            state: NegotiationState::Created,
            data_channels: Vec::new(),
            candidates: Vec::new(),
            commands,
            closing,
        }
    }

    /// Hand a command to the worker.
    pub(crate) fn send(
        &self,
        command: PeerCommand,
    ) -> Result<(), mpsc::error::SendError<PeerCommand>> {
        self.commands.send(command)
    }

    /// Tell the worker to stop. Dropping the record has the same effect.
    pub(crate) fn close(self) {
        // the worker may already be gone
        let _ = self.closing.send(true);
    }
}
