//! WebSocket signaling handler
//!
//! One socket per participant connection. Inbound text frames are decoded
//! as [`ClientMessage`], dispatched to the coordinator in arrival order for
//! this connection (concurrently across connections), and answered with a
//! [`ServerMessage`] carrying the request's `request_id`. Room events for
//! the participant are pumped onto the same socket. When the socket drops,
//! every room the connection joined is swept through the disconnect path.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::messages::{ClientMessage, ServerMessage};
use super::AppState;
use huddle_core::{event_channel, EventSender, ParticipantId, RoomId};

/// Outbound frame buffer; slow clients get disconnected rather than
/// buffering without bound
const OUTBOUND_BUFFER: usize = 1000;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Participant identity; minted server-side when absent
    pub participant_id: Option<String>,
}

/// WebSocket handler for the signaling protocol
///
/// Clients connect to `ws://host/api/ws?participant_id={id}`.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let participant_id = query
        .participant_id
        .filter(|id| !id.is_empty())
        .map_or_else(ParticipantId::new, ParticipantId::from_string);

    // Signaling frames are small; cap well below the axum default
    ws.max_message_size(64 * 1024)
        .on_upgrade(move |socket| handle_socket(socket, state, participant_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, participant_id: ParticipantId) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(
        participant_id = %participant_id,
        connection_id = %connection_id,
        "WebSocket connection established"
    );

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    // Writer task: outbound frames -> socket
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // Event pump: room events for this participant -> outbound frames
    let (event_tx, mut event_rx) = event_channel();
    let pump_tx = out_tx.clone();
    let pump = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if pump_tx.send(json).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(error = %e, "Failed to encode event"),
            }
        }
    });

    // Rooms this connection has joined, for the disconnect sweep
    let mut joined: HashSet<RoomId> = HashSet::new();

    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(request) => {
                        handle_message(&state, &participant_id, &event_tx, &mut joined, request)
                            .await
                    }
                    Err(e) => ServerMessage::Error {
                        request_id: None,
                        kind: "invalid_input".to_string(),
                        message: format!("malformed message: {e}"),
                        retryable: false,
                    },
                };
                match serde_json::to_string(&reply) {
                    Ok(json) => {
                        if out_tx.send(json).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to encode response"),
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Ignore binary/ping/pong frames
            }
            Err(e) => {
                debug!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Transport-level disconnect: compensating cleanup in every joined room
    for room_id in &joined {
        state.coordinator.disconnect(room_id, &participant_id).await;
    }

    pump.abort();
    writer.abort();

    info!(
        participant_id = %participant_id,
        connection_id = %connection_id,
        rooms_swept = joined.len(),
        "WebSocket connection closed"
    );
}

/// Dispatch one decoded request to the coordinator
async fn handle_message(
    state: &AppState,
    participant_id: &ParticipantId,
    event_tx: &EventSender,
    joined: &mut HashSet<RoomId>,
    request: ClientMessage,
) -> ServerMessage {
    let coordinator = &state.coordinator;
    match request {
        ClientMessage::CreateRoom { request_id } => match coordinator.create_room().await {
            Ok(room_id) => ServerMessage::RoomCreated {
                request_id,
                room_id,
            },
            Err(e) => ServerMessage::error(Some(request_id), &e),
        },

        ClientMessage::JoinRoom {
            request_id,
            room_id,
        } => match coordinator
            .join_room(&room_id, participant_id, event_tx.clone())
            .await
        {
            Ok(joined_room) => {
                joined.insert(room_id.clone());
                ServerMessage::RoomJoined {
                    request_id,
                    room_id,
                    rtp_capabilities: joined_room.rtp_capabilities,
                    producers: joined_room.producers,
                }
            }
            Err(e) => ServerMessage::error(Some(request_id), &e),
        },

        ClientMessage::CreateTransport {
            request_id,
            room_id,
            direction,
        } => match coordinator
            .create_transport(&room_id, participant_id, direction)
            .await
        {
            Ok(params) => ServerMessage::TransportCreated {
                request_id,
                room_id,
                params,
            },
            Err(e) => ServerMessage::error(Some(request_id), &e),
        },

        ClientMessage::ConnectTransport {
            request_id,
            room_id,
            transport_id,
            dtls_parameters,
        } => match coordinator
            .connect_transport(&room_id, participant_id, &transport_id, dtls_parameters)
            .await
        {
            Ok(()) => ServerMessage::TransportConnected {
                request_id,
                room_id,
                transport_id,
            },
            Err(e) => ServerMessage::error(Some(request_id), &e),
        },

        ClientMessage::Produce {
            request_id,
            room_id,
            kind,
            rtp_parameters,
        } => match coordinator
            .produce(&room_id, participant_id, kind, rtp_parameters)
            .await
        {
            Ok(id) => ServerMessage::Produced {
                request_id,
                room_id,
                id,
            },
            Err(e) => ServerMessage::error(Some(request_id), &e),
        },

        ClientMessage::Consume {
            request_id,
            room_id,
            producer_id,
            rtp_capabilities,
        } => match coordinator
            .consume(&room_id, participant_id, &producer_id, rtp_capabilities)
            .await
        {
            Ok(params) => ServerMessage::Consumed {
                request_id,
                room_id,
                params,
            },
            Err(e) => ServerMessage::error(Some(request_id), &e),
        },

        ClientMessage::Leave {
            request_id,
            room_id,
        } => {
            coordinator.disconnect(&room_id, participant_id).await;
            joined.remove(&room_id);
            ServerMessage::Left {
                request_id,
                room_id,
            }
        }
    }
}
