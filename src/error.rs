use entity_store::{EntityId, StoreError};
use thiserror::Error;

use crate::peer::{NegotiationState, Operation};

/// Errors that can occur while building a session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The ICE server URI could not be parsed.
    #[error("invalid ICE server URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The URI scheme is not one of `stun`, `stuns`, `turn`, `turns`.
    #[error("unsupported ICE server scheme '{0}'")]
    UnsupportedScheme(String),

    /// The port is not a number in `1..=65535`.
    #[error("invalid port in ICE server URI '{0}'")]
    InvalidPort(String),
}

/// Errors reported synchronously when a command is rejected.
///
/// A rejected command changes no entity state and produces no notification.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The entity is missing, consumed, or of another kind.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The operation is not allowed in the peer connection's current state.
    #[error("{operation} is not valid for peer connection '{id}' while {state}")]
    InvalidState {
        id: EntityId,
        state: NegotiationState,
        operation: Operation,
    },

    /// The engine failed a synchronous composition step.
    #[error(transparent)]
    Engine(EngineError),

    /// The peer connection's worker has stopped.
    #[error("peer connection '{0}' is no longer running")]
    Closed(EntityId),

    /// The session was created outside of a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The owner dropped its notification receiver.
    #[error(transparent)]
    OwnerGone(#[from] BridgeError),
}

/// Failures inside the RTC engine, delivered in notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Building a media engine, registry, or api failed.
    #[error("engine setup failed: {0}")]
    Setup(String),

    /// The native peer connection could not be created.
    #[error("failed to construct peer connection: {0}")]
    Construction(String),

    /// A session description was malformed or rejected.
    #[error("session description rejected: {0}")]
    Description(String),

    /// An offer or answer could not be produced.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// A data channel could not be created.
    #[error("data channel failed: {0}")]
    DataChannel(String),

    /// A remote ICE candidate was rejected.
    #[error("ICE candidate rejected: {0}")]
    Candidate(String),

    /// The transport failed after negotiation.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Closing the native peer connection reported an error.
    #[error("close failed: {0}")]
    Close(String),
}

/// Errors raised while delivering notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// Nobody is left to receive notifications.
    #[error("notification owner is gone")]
    OwnerGone,
}
