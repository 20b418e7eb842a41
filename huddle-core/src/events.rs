//! Signaling events fanned out to room members
//!
//! The coordinator computes the recipient list under the room lock and
//! dispatches after releasing it; senders are plain unbounded channels whose
//! receive side is owned by each participant's connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{MediaKind, ParticipantId, ProducerId, RoomId};

/// Message sender for a participant's connection
pub type EventSender = mpsc::UnboundedSender<SignalEvent>;
/// Receive side handed to the connection's write loop
pub type EventReceiver = mpsc::UnboundedReceiver<SignalEvent>;

/// Create a connection event channel
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Events pushed to room members without a request from them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalEvent {
    /// A member published a new media stream; receivers decide independently
    /// whether and when to consume it
    NewProducer {
        room_id: RoomId,
        producer_id: ProducerId,
        participant_id: ParticipantId,
        kind: MediaKind,
        timestamp: DateTime<Utc>,
    },

    /// A producer went away (owner closed its transport or disconnected)
    ProducerClosed {
        room_id: RoomId,
        producer_id: ProducerId,
        timestamp: DateTime<Utc>,
    },

    /// A participant joined the room
    ParticipantJoined {
        room_id: RoomId,
        participant_id: ParticipantId,
        timestamp: DateTime<Utc>,
    },

    /// A participant left the room (explicit leave or disconnect)
    ParticipantLeft {
        room_id: RoomId,
        participant_id: ParticipantId,
        timestamp: DateTime<Utc>,
    },
}

impl SignalEvent {
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::NewProducer { .. } => "new_producer",
            Self::ProducerClosed { .. } => "producer_closed",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
        }
    }
}

/// Dispatch an event to a precomputed recipient list, returning how many
/// sends succeeded. Failed sends mean the receiver's connection is already
/// gone; its state is torn down by the disconnect path, so failures are only
/// logged here.
pub fn dispatch(recipients: &[(ParticipantId, EventSender)], event: &SignalEvent) -> usize {
    let mut sent = 0;
    for (participant_id, sender) in recipients {
        match sender.send(event.clone()) {
            Ok(()) => sent += 1,
            Err(_) => {
                warn!(
                    participant_id = %participant_id,
                    event_type = %event.event_type(),
                    "Failed to deliver event, connection already closed"
                );
            }
        }
    }
    if sent > 0 {
        debug!(
            sent,
            event_type = %event.event_type(),
            "Event dispatched"
        );
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_counts_live_receivers() {
        let (tx1, mut rx1) = event_channel();
        let (tx2, rx2) = event_channel();
        drop(rx2);

        let recipients = vec![
            (ParticipantId::from("alice"), tx1),
            (ParticipantId::from("bob"), tx2),
        ];
        let event = SignalEvent::ProducerClosed {
            room_id: RoomId::from("room"),
            producer_id: ProducerId::from("p1"),
            timestamp: Utc::now(),
        };

        assert_eq!(dispatch(&recipients, &event), 1);
        let received = rx1.recv().await.expect("alice should receive");
        assert_eq!(received.event_type(), "producer_closed");
    }

    #[test]
    fn test_event_wire_shape() {
        let event = SignalEvent::NewProducer {
            room_id: RoomId::from("r1"),
            producer_id: ProducerId::from("p1"),
            participant_id: ParticipantId::from("alice"),
            kind: MediaKind::Video,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["type"], "new_producer");
        assert_eq!(json["producer_id"], "p1");
        assert_eq!(json["kind"], "video");
    }
}
