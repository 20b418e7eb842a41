//! Signaling coordinator - orchestrates participant requests against the
//! session registry and the capability gateway
//!
//! Every operation takes the explicit room ID from the request payload,
//! acquires that room's serialization lock, validates, calls the gateway
//! where needed (suspending with the lock held, so no other mutation of the
//! same room can interleave), and releases the lock before fanning events
//! out to the precomputed recipient list. A disconnect racing an in-flight
//! request queues on the same lock and then removes whatever the request
//! created, so no orphaned resource survives.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::{ConsumerParams, TransportParams, WebRtcTransportOptions};
use crate::error::{Error, Result};
use crate::events::{dispatch, EventSender, SignalEvent};
use crate::registry::SessionRegistry;
use crate::room::{ProducerEntry, ProducerInfo, TransportEntry};
use crate::types::{MediaKind, ParticipantId, ProducerId, RoomId, TransportId, TransportRole};

/// Response to a successful join: the room's capability descriptor plus the
/// producers that already exist, so late joiners can consume immediately
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedRoom {
    pub rtp_capabilities: Value,
    pub producers: Vec<ProducerInfo>,
}

pub struct SignalingCoordinator {
    registry: Arc<SessionRegistry>,
}

impl SignalingCoordinator {
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn config(&self) -> &Arc<Config> {
        self.registry.config()
    }

    /// Create a new room and return its identifier
    pub async fn create_room(&self) -> Result<RoomId> {
        let room = self.registry.create_room().await?;
        Ok(room.id().clone())
    }

    /// Join a room: register the participant's event channel in the room's
    /// broadcast set and return the router capability descriptor.
    ///
    /// Rejoining replaces the previous event channel, which is how a
    /// reconnecting participant resumes delivery.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        participant: &ParticipantId,
        sender: EventSender,
    ) -> Result<JoinedRoom> {
        let room = self.registry.get_room(room_id)?;

        let (joined, recipients) = {
            let mut state = room.lock().await;

            let already_member = state.members.contains_key(participant);
            let max = self.config().rooms.max_participants_per_room;
            if !already_member && max > 0 && state.members.len() >= max {
                return Err(Error::RoomFull);
            }

            state.members.insert(participant.clone(), sender);
            state.update_idle_marker();

            let joined = JoinedRoom {
                rtp_capabilities: room.router().rtp_capabilities(),
                producers: state.producer_infos(),
            };
            let recipients = if already_member {
                Vec::new()
            } else {
                state.recipients_except(participant)
            };
            (joined, recipients)
        };

        if !recipients.is_empty() {
            dispatch(
                &recipients,
                &SignalEvent::ParticipantJoined {
                    room_id: room_id.clone(),
                    participant_id: participant.clone(),
                    timestamp: chrono::Utc::now(),
                },
            );
        }

        info!(
            room_id = %room_id,
            participant_id = %participant,
            "Participant joined room"
        );

        Ok(joined)
    }

    /// Create a transport for the participant in the given role.
    ///
    /// The (participant, role) binding slot is checked before the gateway is
    /// asked for a transport, so a duplicate request fails fast with
    /// `RoleAlreadyBound` and creates nothing.
    pub async fn create_transport(
        &self,
        room_id: &RoomId,
        participant: &ParticipantId,
        role: TransportRole,
    ) -> Result<TransportParams> {
        let room = self.registry.get_room(room_id)?;
        let mut state = room.lock().await;

        if !state.members.contains_key(participant) {
            return Err(Error::ParticipantGone);
        }
        if state.bindings.lookup(participant, role).is_some() {
            return Err(Error::RoleAlreadyBound { role });
        }

        let options = WebRtcTransportOptions::from(&self.config().media);
        let handle = room.router().create_transport(&options).await?;
        let transport_id = handle.id();
        let params = handle.params();

        state.transports.insert(
            transport_id.clone(),
            TransportEntry {
                owner: participant.clone(),
                role,
                connected: false,
                handle,
            },
        );
        if let Err(err) = state
            .bindings
            .bind(participant, role, transport_id.clone())
        {
            // Unreachable while the slot check above holds; keep the room
            // consistent anyway
            if let Some(entry) = state.transports.remove(&transport_id) {
                drop(state);
                let _ = entry.handle.close().await;
            }
            return Err(err);
        }
        state.update_idle_marker();
        drop(state);

        info!(
            room_id = %room_id,
            participant_id = %participant,
            transport_id = %transport_id,
            role = %role,
            "Transport created"
        );

        Ok(params)
    }

    /// Complete DTLS negotiation for a transport. Each transport is
    /// connected exactly once.
    pub async fn connect_transport(
        &self,
        room_id: &RoomId,
        participant: &ParticipantId,
        transport_id: &TransportId,
        dtls_parameters: Value,
    ) -> Result<()> {
        let room = self.registry.get_room(room_id)?;
        let mut state = room.lock().await;

        if !state.members.contains_key(participant) {
            return Err(Error::ParticipantGone);
        }

        let handle = {
            let entry = state
                .transports
                .get(transport_id)
                .ok_or_else(|| Error::TransportNotFound(transport_id.clone()))?;
            // A participant can only connect their own transport
            if entry.owner != *participant {
                return Err(Error::TransportNotFound(transport_id.clone()));
            }
            if entry.connected {
                return Err(Error::AlreadyConnected(transport_id.clone()));
            }
            Arc::clone(&entry.handle)
        };

        handle.connect(dtls_parameters).await?;

        if let Some(entry) = state.transports.get_mut(transport_id) {
            entry.connected = true;
        }

        info!(
            room_id = %room_id,
            participant_id = %participant,
            transport_id = %transport_id,
            "Transport connected"
        );

        Ok(())
    }

    /// Publish a media stream on the participant's connected send transport
    /// and announce it to every other room member.
    pub async fn produce(
        &self,
        room_id: &RoomId,
        participant: &ParticipantId,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<ProducerId> {
        let room = self.registry.get_room(room_id)?;

        let (producer_id, recipients) = {
            let mut state = room.lock().await;

            if !state.members.contains_key(participant) {
                return Err(Error::ParticipantGone);
            }

            let transport_id = state
                .bindings
                .lookup(participant, TransportRole::Send)
                .cloned()
                .ok_or(Error::SendTransportNotFound)?;
            let handle = {
                let entry = state
                    .transports
                    .get(&transport_id)
                    .ok_or(Error::SendTransportNotFound)?;
                // An unconnected transport cannot carry media yet
                if !entry.connected {
                    return Err(Error::SendTransportNotFound);
                }
                Arc::clone(&entry.handle)
            };

            let producer = handle.produce(kind, rtp_parameters).await?;
            let producer_id = producer.id();
            state.producers.insert(
                producer_id.clone(),
                ProducerEntry {
                    owner: participant.clone(),
                    kind,
                    transport_id,
                    handle: producer,
                },
            );

            (producer_id, state.recipients_except(participant))
        };

        dispatch(
            &recipients,
            &SignalEvent::NewProducer {
                room_id: room_id.clone(),
                producer_id: producer_id.clone(),
                participant_id: participant.clone(),
                kind,
                timestamp: chrono::Utc::now(),
            },
        );

        info!(
            room_id = %room_id,
            participant_id = %participant,
            producer_id = %producer_id,
            kind = %kind,
            "Producer created"
        );

        Ok(producer_id)
    }

    /// Create a consumer for a producer on the participant's connected
    /// receive transport. The parameters go to the caller only; consumers
    /// are not tracked by the registry.
    pub async fn consume(
        &self,
        room_id: &RoomId,
        participant: &ParticipantId,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<ConsumerParams> {
        let room = self.registry.get_room(room_id)?;
        let state = room.lock().await;

        if !state.members.contains_key(participant) {
            return Err(Error::ParticipantGone);
        }
        if !state.producers.contains_key(producer_id) {
            return Err(Error::ProducerNotFound(producer_id.clone()));
        }

        let handle = {
            let transport_id = state
                .bindings
                .lookup(participant, TransportRole::Receive)
                .cloned()
                .ok_or(Error::RecvTransportNotFound)?;
            let entry = state
                .transports
                .get(&transport_id)
                .ok_or(Error::RecvTransportNotFound)?;
            if !entry.connected {
                return Err(Error::RecvTransportNotFound);
            }
            Arc::clone(&entry.handle)
        };

        if !room
            .router()
            .can_consume(producer_id, &rtp_capabilities)
            .await?
        {
            return Err(Error::IncompatibleCapabilities);
        }

        let params = handle.consume(producer_id, rtp_capabilities).await?;

        debug!(
            room_id = %room_id,
            participant_id = %participant,
            producer_id = %producer_id,
            consumer_id = %params.id,
            "Consumer created"
        );

        Ok(params)
    }
}

impl std::fmt::Debug for SignalingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingCoordinator").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LoopbackEngine;
    use crate::events::event_channel;

    fn coordinator_with(mutate: impl FnOnce(&mut Config)) -> SignalingCoordinator {
        let mut config = Config::default();
        mutate(&mut config);
        let registry = SessionRegistry::new(Arc::new(LoopbackEngine::new()), Arc::new(config));
        SignalingCoordinator::new(registry)
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let coordinator = coordinator_with(|_| {});
        let (tx, _rx) = event_channel();
        let err = coordinator
            .join_room(&RoomId::from("missing"), &ParticipantId::from("alice"), tx)
            .await
            .expect_err("join should fail");
        assert!(matches!(err, Error::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_room_full() {
        let coordinator = coordinator_with(|c| c.rooms.max_participants_per_room = 1);
        let room_id = coordinator.create_room().await.expect("room");

        let (tx_a, _rx_a) = event_channel();
        coordinator
            .join_room(&room_id, &ParticipantId::from("alice"), tx_a)
            .await
            .expect("first join should succeed");

        let (tx_b, _rx_b) = event_channel();
        let err = coordinator
            .join_room(&room_id, &ParticipantId::from("bob"), tx_b)
            .await
            .expect_err("second join should fail");
        assert!(matches!(err, Error::RoomFull));

        // Rejoin of an existing member is not a capacity violation
        let (tx_a2, _rx_a2) = event_channel();
        coordinator
            .join_room(&room_id, &ParticipantId::from("alice"), tx_a2)
            .await
            .expect("rejoin should succeed");
    }

    #[tokio::test]
    async fn test_create_transport_requires_membership() {
        let coordinator = coordinator_with(|_| {});
        let room_id = coordinator.create_room().await.expect("room");

        let err = coordinator
            .create_transport(&room_id, &ParticipantId::from("ghost"), TransportRole::Send)
            .await
            .expect_err("non-member should be rejected");
        assert!(matches!(err, Error::ParticipantGone));
    }

    #[tokio::test]
    async fn test_connect_wrong_owner() {
        let coordinator = coordinator_with(|_| {});
        let room_id = coordinator.create_room().await.expect("room");
        let alice = ParticipantId::from("alice");
        let bob = ParticipantId::from("bob");

        let (tx_a, _rx_a) = event_channel();
        let (tx_b, _rx_b) = event_channel();
        coordinator.join_room(&room_id, &alice, tx_a).await.expect("join");
        coordinator.join_room(&room_id, &bob, tx_b).await.expect("join");

        let params = coordinator
            .create_transport(&room_id, &alice, TransportRole::Send)
            .await
            .expect("transport");

        let err = coordinator
            .connect_transport(&room_id, &bob, &params.id, serde_json::json!({}))
            .await
            .expect_err("bob cannot connect alice's transport");
        assert!(matches!(err, Error::TransportNotFound(_)));
    }
}
