//! Connection lifecycle management - compensating cleanup on disconnect
//!
//! Explicit "leave" and transport-level disconnect drive the same
//! mutations, under the same per-room lock the request path uses. The whole
//! sequence is idempotent: a second invocation for the same participant
//! finds nothing left to remove and emits nothing.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::coordinator::SignalingCoordinator;
use crate::engine::{ProducerHandle, TransportHandle};
use crate::events::{dispatch, SignalEvent};
use crate::types::{ParticipantId, ProducerId, RoomId};

impl SignalingCoordinator {
    /// Tear down everything a participant holds in a room.
    ///
    /// Steps, per the cleanup contract:
    /// 1. unbind and remove every transport, closing each at the gateway
    ///    (the gateway invalidates producers/consumers anchored to them);
    /// 2. remove any producer still recorded for the participant
    ///    (tolerates engines that do not cascade-delete);
    /// 3. remove the participant from the broadcast set;
    /// 4. notify remaining members; room eviction stays lazy.
    ///
    /// Gateway close failures are logged and do not abort the remaining
    /// steps - cleanup is best-effort-complete, not all-or-nothing.
    pub async fn disconnect(&self, room_id: &RoomId, participant: &ParticipantId) {
        let Ok(room) = self.registry().get_room(room_id) else {
            debug!(
                room_id = %room_id,
                participant_id = %participant,
                "Disconnect for unknown room, nothing to clean up"
            );
            return;
        };

        let mut transports: Vec<Arc<dyn TransportHandle>> = Vec::new();
        let mut producers: Vec<(ProducerId, Arc<dyn ProducerHandle>)> = Vec::new();
        let was_member;
        let recipients;
        {
            let mut state = room.lock().await;

            for transport_id in state.bindings.unbind_all_for(participant) {
                if let Some(entry) = state.transports.remove(&transport_id) {
                    transports.push(entry.handle);
                }
            }

            let owned: Vec<ProducerId> = state
                .producers
                .iter()
                .filter(|(_, entry)| entry.owner == *participant)
                .map(|(id, _)| id.clone())
                .collect();
            for producer_id in owned {
                if let Some(entry) = state.producers.remove(&producer_id) {
                    producers.push((producer_id, entry.handle));
                }
            }

            was_member = state.members.remove(participant).is_some();
            recipients = state.recipients_except(participant);
            state.update_idle_marker();
        }

        // Close at the gateway outside the lock; the room no longer
        // references any of these handles
        for transport in &transports {
            if let Err(e) = transport.close().await {
                warn!(
                    room_id = %room_id,
                    transport_id = %transport.id(),
                    error = %e,
                    "Failed to close transport during disconnect, continuing"
                );
            }
        }
        for (producer_id, producer) in &producers {
            if let Err(e) = producer.close().await {
                warn!(
                    room_id = %room_id,
                    producer_id = %producer_id,
                    error = %e,
                    "Failed to close producer during disconnect, continuing"
                );
            }
        }

        for (producer_id, _) in &producers {
            dispatch(
                &recipients,
                &SignalEvent::ProducerClosed {
                    room_id: room_id.clone(),
                    producer_id: producer_id.clone(),
                    timestamp: chrono::Utc::now(),
                },
            );
        }
        if was_member {
            dispatch(
                &recipients,
                &SignalEvent::ParticipantLeft {
                    room_id: room_id.clone(),
                    participant_id: participant.clone(),
                    timestamp: chrono::Utc::now(),
                },
            );
            info!(
                room_id = %room_id,
                participant_id = %participant,
                closed_transports = transports.len(),
                closed_producers = producers.len(),
                "Participant left room"
            );
        }
    }
}
