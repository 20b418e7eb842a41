// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code and machine-readable kind
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    kind: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            kind: self.kind,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert coordinator errors to HTTP errors
impl From<huddle_core::Error> for AppError {
    fn from(err: huddle_core::Error) -> Self {
        use huddle_core::Error;

        let status = match &err {
            Error::RoomNotFound(_)
            | Error::TransportNotFound(_)
            | Error::SendTransportNotFound
            | Error::RecvTransportNotFound
            | Error::ProducerNotFound(_) => StatusCode::NOT_FOUND,
            Error::RoleAlreadyBound { .. } | Error::AlreadyConnected(_) => StatusCode::CONFLICT,
            Error::IncompatibleCapabilities | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::ParticipantGone => StatusCode::GONE,
            Error::EngineUnavailable(_) | Error::RoomLimitReached | Error::RoomFull => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::ConnectFailed(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {err}");
        }

        Self::new(status, err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{Error, RoomId};

    #[test]
    fn test_status_mapping() {
        let err = AppError::from(Error::RoomNotFound(RoomId::from("r1")));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.kind, "room_not_found");

        let err = AppError::from(Error::EngineUnavailable("starting".to_string()));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let err = AppError::from(Error::ParticipantGone);
        assert_eq!(err.status, StatusCode::GONE);
    }
}
