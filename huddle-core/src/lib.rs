//! huddle-core - room and media-session coordination
//!
//! This crate implements the signaling core for multi-party real-time media
//! sessions: it tracks rooms, negotiates per-participant transport roles,
//! records producer relationships, validates capability compatibility, and
//! tears state down deterministically on disconnect. The media engine
//! itself (RTP routing, ICE/DTLS, codecs) is consumed behind the
//! [`engine::MediaEngine`] trait.
//!
//! ## Architecture
//!
//! - **[`SessionRegistry`]**: owns every room; single source of truth for
//!   room existence and composition
//! - **[`Room`]**: a router plus transports, producers, binding table and
//!   broadcast membership, serialized behind one lock per room
//! - **[`BindingTable`]**: (participant, role) -> transport index enforcing
//!   at most one open transport per role
//! - **[`SignalingCoordinator`]**: validates and executes participant
//!   requests, fans out events to room members
//! - disconnect handling drives the same registry mutations as an explicit
//!   leave and is idempotent
//!
//! ## Usage
//!
//! ```rust,ignore
//! use huddle_core::{
//!     Config, LoopbackEngine, SessionRegistry, SignalingCoordinator,
//! };
//! use std::sync::Arc;
//!
//! let config = Arc::new(Config::default());
//! let registry = SessionRegistry::new(Arc::new(LoopbackEngine::new()), config);
//! let coordinator = SignalingCoordinator::new(registry);
//! let room_id = coordinator.create_room().await?;
//! ```

pub mod bindings;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod room;
pub mod test_helpers;
pub mod types;

pub use bindings::BindingTable;
pub use config::{load_config, Config, LoggingConfig, MediaCodec, MediaConfig, RoomConfig};
pub use coordinator::{JoinedRoom, SignalingCoordinator};
pub use engine::{
    ConsumerParams, LoopbackEngine, MediaEngine, ProducerHandle, RouterHandle, TransportHandle,
    TransportParams, WebRtcTransportOptions,
};
pub use error::{Error, Result};
pub use events::{dispatch, event_channel, EventReceiver, EventSender, SignalEvent};
pub use registry::{RegistryStats, SessionRegistry};
pub use room::{ProducerInfo, Room, RoomSnapshot, RoomStats};
pub use types::{
    ConsumerId, MediaKind, ParticipantId, ProducerId, RoomId, TransportId, TransportRole,
};
