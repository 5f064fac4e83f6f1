use std::fmt;
use std::sync::Arc;

use crate::engine::Engine;
use crate::peer::PeerRecord;

/// Discriminant of the entities a session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EntityKind {
    MediaEngine,
    Registry,
    Api,
    PeerConnection,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::MediaEngine => "media engine",
            EntityKind::Registry => "registry",
            EntityKind::Api => "api",
            EntityKind::PeerConnection => "peer connection",
        })
    }
}

/// Everything the session keeps in its entity store.
pub(crate) enum RtcEntity<E: Engine> {
    MediaEngine(E::MediaEngine),
    Registry(E::Registry),
    Api(Arc<E::Api>),
    PeerConnection(PeerRecord),
}

impl<E: Engine> RtcEntity<E> {
    pub(crate) fn media_engine_mut(&mut self) -> Option<&mut E::MediaEngine> {
        match self {
            RtcEntity::MediaEngine(media_engine) => Some(media_engine),
            _ => None,
        }
    }

    pub(crate) fn api(&self) -> Option<&Arc<E::Api>> {
        match self {
            RtcEntity::Api(api) => Some(api),
            _ => None,
        }
    }

    pub(crate) fn peer(&self) -> Option<&PeerRecord> {
        match self {
            RtcEntity::PeerConnection(record) => Some(record),
            _ => None,
        }
    }

    pub(crate) fn peer_mut(&mut self) -> Option<&mut PeerRecord> {
        match self {
            RtcEntity::PeerConnection(record) => Some(record),
            _ => None,
        }
    }
}

impl<E: Engine> entity_store::Entity for RtcEntity<E> {
    type Kind = EntityKind;

    fn kind(&self) -> EntityKind {
        match self {
            RtcEntity::MediaEngine(_) => EntityKind::MediaEngine,
            RtcEntity::Registry(_) => EntityKind::Registry,
            RtcEntity::Api(_) => EntityKind::Api,
            RtcEntity::PeerConnection(_) => EntityKind::PeerConnection,
        }
    }
}
