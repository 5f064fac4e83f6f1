//! The command surface over one entity store and one notification owner.

use std::sync::Arc;

use entity_store::{EntityId, EntityStore, StoreError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::bridge::{Bridge, Notifications};
use crate::config::SessionConfig;
use crate::engine::{Engine, IceCandidate, SessionDescription};
use crate::entity::{EntityKind, RtcEntity};
use crate::error::{BridgeError, CommandError};
use crate::peer::worker::{PeerCommand, PeerWorker};
use crate::peer::{DataChannelInfo, DataChannelState, NegotiationState, Operation, PeerRecord};

/// State shared by every handle to a session and reachable from its workers.
pub(crate) struct Shared<E: Engine> {
    pub(crate) engine: E,
    pub(crate) config: SessionConfig,
    pub(crate) store: EntityStore<RtcEntity<E>>,
    bridge: Bridge,
    runtime: Handle,
}

/// A set of RTC entities with a single notification owner.
///
/// Commands return as soon as they are validated. Work the engine performs
/// asynchronously is reported later through the [`Notifications`] returned
/// by [`Session::init`]. Handles are cheap to clone and may be used from any
/// thread.
pub struct Session<E: Engine> {
    inner: Arc<Shared<E>>,
}

impl<E: Engine> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Engine> Session<E> {
    /// Create a session and its only notification receiver.
    ///
    /// Must be called from within a tokio runtime; connection workers are
    /// spawned onto it.
    pub fn init(engine: E, config: SessionConfig) -> Result<(Self, Notifications), CommandError> {
        let runtime = Handle::try_current().map_err(|_| CommandError::NoRuntime)?;
        let config = config.or_default();
        let (bridge, notifications) = Bridge::new();

        info!(
            ice_servers = ?config.ice_servers.iter().map(|s| s.uri()).collect::<Vec<_>>(),
            "Session initialized"
        );

        let session = Self {
            inner: Arc::new(Shared {
                engine,
                config,
                store: EntityStore::new(),
                bridge,
                runtime,
            }),
        };
        Ok((session, notifications))
    }

    /// The configuration every peer connection is created with.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn new_media_engine(&self) -> Result<EntityId, CommandError> {
        let media_engine = self
            .inner
            .engine
            .new_media_engine()
            .map_err(CommandError::Engine)?;
        let id = self.inner.store.insert(RtcEntity::MediaEngine(media_engine))?;
        debug!(media_engine = %id, "Media engine created");
        Ok(id)
    }

    /// Build an interceptor registry against a media engine. The media
    /// engine stays available.
    pub fn new_registry(&self, media_engine: &EntityId) -> Result<EntityId, CommandError> {
        let engine = &self.inner.engine;
        let registry = self.inner.store.with_available_mut(
            media_engine,
            EntityKind::MediaEngine,
            |entity| {
                entity
                    .media_engine_mut()
                    .map(|media_engine| engine.new_registry(media_engine))
            },
        )?;
        let registry = registry
            .ok_or_else(|| unavailable(media_engine, EntityKind::MediaEngine))?
            .map_err(CommandError::Engine)?;

        let id = self.inner.store.insert(RtcEntity::Registry(registry))?;
        debug!(registry = %id, media_engine = %media_engine, "Registry created");
        Ok(id)
    }

    /// Compose an api from a media engine and a registry, consuming both.
    ///
    /// Either both are consumed or, on any error, neither is.
    pub fn new_api(
        &self,
        media_engine: &EntityId,
        registry: &EntityId,
    ) -> Result<EntityId, CommandError> {
        let mut consumed = self
            .inner
            .store
            .try_consume(&[
                (media_engine, EntityKind::MediaEngine),
                (registry, EntityKind::Registry),
            ])?
            .into_iter();

        let (Some(RtcEntity::MediaEngine(media)), Some(RtcEntity::Registry(interceptors))) =
            (consumed.next(), consumed.next())
        else {
            return Err(unavailable(media_engine, EntityKind::MediaEngine));
        };

        let api = self.inner.engine.new_api(media, interceptors);
        let id = self.inner.store.insert(RtcEntity::Api(Arc::new(api)))?;
        info!(api = %id, media_engine = %media_engine, registry = %registry, "Api created");
        Ok(id)
    }

    pub fn media_engine_exists(&self, id: &EntityId) -> Result<bool, CommandError> {
        Ok(self.inner.store.exists_as(id, EntityKind::MediaEngine)?)
    }

    pub fn registry_exists(&self, id: &EntityId) -> Result<bool, CommandError> {
        Ok(self.inner.store.exists_as(id, EntityKind::Registry)?)
    }

    pub fn api_exists(&self, id: &EntityId) -> Result<bool, CommandError> {
        Ok(self.inner.store.exists_as(id, EntityKind::Api)?)
    }

    pub fn peer_connection_exists(&self, id: &EntityId) -> Result<bool, CommandError> {
        Ok(self.inner.store.exists_as(id, EntityKind::PeerConnection)?)
    }

    /// Create a peer connection from an api. The api is not consumed.
    ///
    /// `peer_connection_ready` follows once the engine has built it.
    pub fn new_peer_connection(&self, api: &EntityId) -> Result<EntityId, CommandError> {
        self.ensure_owner()?;
        let shared_api = self
            .inner
            .store
            .with_available(api, EntityKind::Api, |entity| entity.api().cloned())?
            .ok_or_else(|| unavailable(api, EntityKind::Api))?;

        let (commands, queue) = mpsc::unbounded_channel();
        let (closing, closing_rx) = watch::channel(false);
        let id = self
            .inner
            .store
            .insert(RtcEntity::PeerConnection(PeerRecord::new(commands, closing)))?;

        let worker = PeerWorker::new(
            id.clone(),
            Arc::downgrade(&self.inner),
            self.inner.bridge.clone(),
            shared_api,
            queue,
            closing_rx,
        );
        self.inner.runtime.spawn(worker.run());

        info!(peer = %id, api = %api, "Peer connection created");
        Ok(id)
    }

    /// Request a data channel. Returns the channel's id right away;
    /// `data_channel_created` reports the outcome.
    pub fn create_data_channel(
        &self,
        id: &EntityId,
        label: impl Into<String>,
    ) -> Result<EntityId, CommandError> {
        let channel = EntityId::generate();
        let label = label.into();
        let info = DataChannelInfo {
            id: channel.clone(),
            label: label.clone(),
            state: DataChannelState::Requested,
        };
        self.issue(
            id,
            Operation::CreateDataChannel,
            PeerCommand::CreateDataChannel {
                channel: channel.clone(),
                label,
            },
            |record| record.data_channels.push(info),
        )?;
        Ok(channel)
    }

    pub fn create_offer(&self, id: &EntityId) -> Result<(), CommandError> {
        self.issue(id, Operation::CreateOffer, PeerCommand::CreateOffer, |_| {})
    }

    pub fn create_answer(&self, id: &EntityId) -> Result<(), CommandError> {
        self.issue(id, Operation::CreateAnswer, PeerCommand::CreateAnswer, |_| {})
    }

    pub fn set_local_description(
        &self,
        id: &EntityId,
        description: SessionDescription,
    ) -> Result<(), CommandError> {
        self.issue(
            id,
            Operation::SetLocalDescription,
            PeerCommand::SetLocalDescription(description),
            |_| {},
        )
    }

    pub fn set_remote_description(
        &self,
        id: &EntityId,
        description: SessionDescription,
    ) -> Result<(), CommandError> {
        self.issue(
            id,
            Operation::SetRemoteDescription,
            PeerCommand::SetRemoteDescription(description),
            |_| {},
        )
    }

    /// Hand a candidate received from the remote side to the engine.
    pub fn add_ice_candidate(
        &self,
        id: &EntityId,
        candidate: IceCandidate,
    ) -> Result<(), CommandError> {
        self.issue(
            id,
            Operation::AddIceCandidate,
            PeerCommand::AddIceCandidate(candidate),
            |_| {},
        )
    }

    /// Close a peer connection.
    ///
    /// The record is gone when this returns. Queued and in-flight commands
    /// are abandoned without notifications, and `peer_connection_closed` is
    /// the last notification for `id`.
    pub fn close(&self, id: &EntityId) -> Result<(), CommandError> {
        let state = self
            .peer_connection_state(id)?
            .ok_or_else(|| unavailable(id, EntityKind::PeerConnection))?;
        state
            .issue(Operation::Close)
            .ok_or_else(|| CommandError::InvalidState {
                id: id.clone(),
                state,
                operation: Operation::Close,
            })?;
        let Some(RtcEntity::PeerConnection(record)) = self.inner.store.remove(id)? else {
            return Err(unavailable(id, EntityKind::PeerConnection));
        };
        record.close();
        info!(peer = %id, "Peer connection closing");
        Ok(())
    }

    /// The connection's negotiation state, or `None` if there is no such
    /// connection.
    pub fn peer_connection_state(
        &self,
        id: &EntityId,
    ) -> Result<Option<NegotiationState>, CommandError> {
        self.inspect(id, |record| record.state)
    }

    /// Local candidates gathered so far.
    pub fn local_candidates(&self, id: &EntityId) -> Result<Vec<IceCandidate>, CommandError> {
        Ok(self
            .inspect(id, |record| record.candidates.clone())?
            .unwrap_or_default())
    }

    pub fn data_channels(&self, id: &EntityId) -> Result<Vec<DataChannelInfo>, CommandError> {
        Ok(self
            .inspect(id, |record| record.data_channels.clone())?
            .unwrap_or_default())
    }

    fn inspect<R>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&PeerRecord) -> R,
    ) -> Result<Option<R>, CommandError> {
        match self
            .inner
            .store
            .with_available(id, EntityKind::PeerConnection, |entity| {
                entity.peer().map(f)
            }) {
            Ok(found) => Ok(found),
            Err(StoreError::Unavailable { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate `operation` against the connection's state and enqueue it.
    ///
    /// The store lock is held from the state check until the command is
    /// queued, so commands reach the worker in the order they were accepted.
    fn issue(
        &self,
        id: &EntityId,
        operation: Operation,
        command: PeerCommand,
        accepted: impl FnOnce(&mut PeerRecord),
    ) -> Result<(), CommandError> {
        self.ensure_owner()?;
        self.inner
            .store
            .with_available_mut(id, EntityKind::PeerConnection, |entity| {
                let record = entity
                    .peer_mut()
                    .ok_or_else(|| unavailable(id, EntityKind::PeerConnection))?;
                let next = record
                    .state
                    .issue(operation)
                    .ok_or_else(|| CommandError::InvalidState {
                        id: id.clone(),
                        state: record.state,
                        operation,
                    })?;
                record
                    .send(command)
                    .map_err(|_| CommandError::Closed(id.clone()))?;
                record.state = next;
                accepted(record);
                debug!(peer = %id, operation = %operation, "Command queued");
                Ok(())
            })?
    }

    fn ensure_owner(&self) -> Result<(), CommandError> {
        if self.inner.bridge.is_closed() {
            return Err(BridgeError::OwnerGone.into());
        }
        Ok(())
    }
}

fn unavailable(id: &EntityId, kind: EntityKind) -> CommandError {
    CommandError::Store(StoreError::Unavailable {
        id: id.clone(),
        kind: kind.to_string(),
    })
}
