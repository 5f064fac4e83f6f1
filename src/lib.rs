//! Native RTC entities behind an ownership-checked store, with asynchronous
//! results delivered to a single owner as ordered notifications.
//!
//! A [`Session`] tracks media engines, interceptor registries, apis and peer
//! connections by opaque [`EntityId`]. Composing an api consumes its media
//! engine and registry atomically. Peer connection commands are validated
//! against a negotiation state machine and executed in issue order by one
//! worker task per connection; their outcomes arrive on [`Notifications`].

pub mod bridge;
pub mod config;
pub mod engine;
mod entity;
pub mod error;
pub mod peer;
pub mod session;

pub use bridge::{Notification, NotificationKind, Notifications, Payload};
pub use config::{IceServer, SessionConfig};
pub use engine::webrtc_rs::WebRtcEngine;
pub use engine::{IceCandidate, SdpKind, SessionDescription};
pub use entity_store::{EntityId, StoreError};
pub use error::{BridgeError, CommandError, ConfigError, EngineError};
pub use peer::{DataChannelInfo, DataChannelState, NegotiationState, Operation};
pub use session::Session;
