use thiserror::Error;

use crate::types::{ProducerId, RoomId, TransportId, TransportRole};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Transport not found: {0}")]
    TransportNotFound(TransportId),

    #[error("No send transport for this participant")]
    SendTransportNotFound,

    #[error("No receive transport for this participant")]
    RecvTransportNotFound,

    #[error("A {role} transport is already bound for this participant")]
    RoleAlreadyBound { role: TransportRole },

    #[error("Transport already connected: {0}")]
    AlreadyConnected(TransportId),

    #[error("Transport connect failed: {0}")]
    ConnectFailed(String),

    #[error("Producer not found: {0}")]
    ProducerNotFound(ProducerId),

    #[error("Declared capabilities cannot consume this producer")]
    IncompatibleCapabilities,

    #[error("Media engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Participant is not (or no longer) in the room")]
    ParticipantGone,

    #[error("Room is full")]
    RoomFull,

    #[error("Maximum number of rooms reached")]
    RoomLimitReached,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable error kind for structured wire responses
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room_not_found",
            Self::TransportNotFound(_) => "transport_not_found",
            Self::SendTransportNotFound => "send_transport_not_found",
            Self::RecvTransportNotFound => "recv_transport_not_found",
            Self::RoleAlreadyBound { .. } => "role_already_bound",
            Self::AlreadyConnected(_) => "already_connected",
            Self::ConnectFailed(_) => "connect_failed",
            Self::ProducerNotFound(_) => "producer_not_found",
            Self::IncompatibleCapabilities => "incompatible_capabilities",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::ParticipantGone => "participant_gone",
            Self::RoomFull => "room_full",
            Self::RoomLimitReached => "room_limit_reached",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the caller may retry the same request after a delay
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_) | Self::RoomLimitReached)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::ParticipantGone.kind(), "participant_gone");
        assert_eq!(
            Error::RoleAlreadyBound {
                role: TransportRole::Send
            }
            .kind(),
            "role_already_bound"
        );
        assert_eq!(
            Error::EngineUnavailable("worker not initialized".to_string()).kind(),
            "engine_unavailable"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::EngineUnavailable("starting".to_string()).is_retryable());
        assert!(!Error::IncompatibleCapabilities.is_retryable());
        assert!(!Error::ParticipantGone.is_retryable());
    }
}
