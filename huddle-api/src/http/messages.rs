//! Signaling message protocol
//!
//! JSON text frames over the per-participant WebSocket, tagged by `type`.
//! Requests carry a client-chosen `request_id` echoed in the matching
//! response, so a client can correlate in-flight requests. Server-initiated
//! events are a separate family ([`huddle_core::SignalEvent`]) serialized
//! with the same outer shape and no `request_id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use huddle_core::{
    ConsumerParams, MediaKind, ProducerId, ProducerInfo, RoomId, TransportId, TransportParams,
    TransportRole,
};

/// Requests a participant sends to the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        request_id: u64,
    },
    JoinRoom {
        request_id: u64,
        room_id: RoomId,
    },
    CreateTransport {
        request_id: u64,
        room_id: RoomId,
        direction: TransportRole,
    },
    ConnectTransport {
        request_id: u64,
        room_id: RoomId,
        transport_id: TransportId,
        dtls_parameters: Value,
    },
    Produce {
        request_id: u64,
        room_id: RoomId,
        kind: MediaKind,
        rtp_parameters: Value,
    },
    Consume {
        request_id: u64,
        room_id: RoomId,
        producer_id: ProducerId,
        rtp_capabilities: Value,
    },
    Leave {
        request_id: u64,
        room_id: RoomId,
    },
}

impl ClientMessage {
    #[must_use]
    pub const fn request_id(&self) -> u64 {
        match self {
            Self::CreateRoom { request_id }
            | Self::JoinRoom { request_id, .. }
            | Self::CreateTransport { request_id, .. }
            | Self::ConnectTransport { request_id, .. }
            | Self::Produce { request_id, .. }
            | Self::Consume { request_id, .. }
            | Self::Leave { request_id, .. } => *request_id,
        }
    }
}

/// Responses the coordinator sends back to the requesting participant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        request_id: u64,
        room_id: RoomId,
    },
    RoomJoined {
        request_id: u64,
        room_id: RoomId,
        rtp_capabilities: Value,
        producers: Vec<ProducerInfo>,
    },
    TransportCreated {
        request_id: u64,
        room_id: RoomId,
        params: TransportParams,
    },
    TransportConnected {
        request_id: u64,
        room_id: RoomId,
        transport_id: TransportId,
    },
    Produced {
        request_id: u64,
        room_id: RoomId,
        id: ProducerId,
    },
    Consumed {
        request_id: u64,
        room_id: RoomId,
        params: ConsumerParams,
    },
    Left {
        request_id: u64,
        room_id: RoomId,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        kind: String,
        message: String,
        retryable: bool,
    },
}

impl ServerMessage {
    /// Structured failure response for a coordinator error
    #[must_use]
    pub fn error(request_id: Option<u64>, err: &huddle_core::Error) -> Self {
        Self::Error {
            request_id,
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
