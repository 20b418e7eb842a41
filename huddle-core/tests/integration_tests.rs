//! End-to-end coordination scenarios over the loopback engine

use std::sync::Arc;

use huddle_core::test_helpers::{
    assert_no_event, coordinator_with_config, dtls_parameters, expect_event, opus_capabilities,
    test_config, test_coordinator, vp8_capabilities, vp8_rtp_parameters,
};
use huddle_core::{
    event_channel, Error, EventReceiver, JoinedRoom, MediaKind, ParticipantId, RoomId,
    SignalEvent, SignalingCoordinator, TransportParams, TransportRole,
};

async fn join(
    coordinator: &Arc<SignalingCoordinator>,
    room_id: &RoomId,
    name: &str,
) -> (ParticipantId, EventReceiver, JoinedRoom) {
    let participant = ParticipantId::from_string(name.to_string());
    let (tx, rx) = event_channel();
    let joined = coordinator
        .join_room(room_id, &participant, tx)
        .await
        .expect("join should succeed");
    (participant, rx, joined)
}

/// Join, create a send transport and connect it
async fn connected_send_transport(
    coordinator: &Arc<SignalingCoordinator>,
    room_id: &RoomId,
    participant: &ParticipantId,
) -> TransportParams {
    let params = coordinator
        .create_transport(room_id, participant, TransportRole::Send)
        .await
        .expect("send transport should be created");
    coordinator
        .connect_transport(room_id, participant, &params.id, dtls_parameters())
        .await
        .expect("send transport should connect");
    params
}

async fn connected_recv_transport(
    coordinator: &Arc<SignalingCoordinator>,
    room_id: &RoomId,
    participant: &ParticipantId,
) -> TransportParams {
    let params = coordinator
        .create_transport(room_id, participant, TransportRole::Receive)
        .await
        .expect("receive transport should be created");
    coordinator
        .connect_transport(room_id, participant, &params.id, dtls_parameters())
        .await
        .expect("receive transport should connect");
    params
}

#[tokio::test]
async fn test_full_produce_consume_scenario() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, mut rx_a, joined_a) = join(&coordinator, &room_id, "alice").await;
    assert!(joined_a.rtp_capabilities["codecs"].is_array());
    assert!(joined_a.producers.is_empty());

    let (bob, mut rx_b, _) = join(&coordinator, &room_id, "bob").await;
    let event = expect_event(&mut rx_a).await;
    assert!(matches!(event, SignalEvent::ParticipantJoined { ref participant_id, .. } if *participant_id == bob));

    // Alice publishes video
    connected_send_transport(&coordinator, &room_id, &alice).await;
    let producer_id = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect("produce should succeed");

    // Exactly Bob is notified
    match expect_event(&mut rx_b).await {
        SignalEvent::NewProducer {
            producer_id: announced,
            participant_id,
            kind,
            ..
        } => {
            assert_eq!(announced, producer_id);
            assert_eq!(participant_id, alice);
            assert_eq!(kind, MediaKind::Video);
        }
        other => panic!("expected new_producer, got {other:?}"),
    }
    assert_no_event(&mut rx_a).await;

    // Bob pulls the stream
    connected_recv_transport(&coordinator, &room_id, &bob).await;
    let params = coordinator
        .consume(&room_id, &bob, &producer_id, vp8_capabilities())
        .await
        .expect("consume should succeed");
    assert_eq!(params.producer_id, producer_id);
    assert_eq!(params.kind, MediaKind::Video);
    assert!(!params.rtp_parameters["codecs"]
        .as_array()
        .expect("consume params should carry codecs")
        .is_empty());
}

#[tokio::test]
async fn test_duplicate_send_transport_rejected() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");
    let (alice, _rx, _) = join(&coordinator, &room_id, "alice").await;

    coordinator
        .create_transport(&room_id, &alice, TransportRole::Send)
        .await
        .expect("first send transport should succeed");
    let err = coordinator
        .create_transport(&room_id, &alice, TransportRole::Send)
        .await
        .expect_err("second send transport should fail");
    assert!(matches!(
        err,
        Error::RoleAlreadyBound {
            role: TransportRole::Send
        }
    ));

    // Binding invariant: still exactly one transport in the room
    let room = coordinator.registry().get_room(&room_id).expect("room");
    assert_eq!(room.stats().await.transports, 1);

    // The other role is unaffected
    coordinator
        .create_transport(&room_id, &alice, TransportRole::Receive)
        .await
        .expect("receive transport should succeed");
}

#[tokio::test]
async fn test_produce_requires_connected_send_transport() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");
    let (alice, _rx, _) = join(&coordinator, &room_id, "alice").await;

    // No transport at all
    let err = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect_err("produce without transport should fail");
    assert!(matches!(err, Error::SendTransportNotFound));

    // Created but never connected
    coordinator
        .create_transport(&room_id, &alice, TransportRole::Send)
        .await
        .expect("transport");
    let err = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect_err("produce on unconnected transport should fail");
    assert!(matches!(err, Error::SendTransportNotFound));

    // No producer was recorded either way
    let room = coordinator.registry().get_room(&room_id).expect("room");
    assert_eq!(room.stats().await.producers, 0);
}

#[tokio::test]
async fn test_connect_exactly_once() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");
    let (alice, _rx, _) = join(&coordinator, &room_id, "alice").await;

    let params = coordinator
        .create_transport(&room_id, &alice, TransportRole::Send)
        .await
        .expect("transport");
    coordinator
        .connect_transport(&room_id, &alice, &params.id, dtls_parameters())
        .await
        .expect("first connect should succeed");
    let err = coordinator
        .connect_transport(&room_id, &alice, &params.id, dtls_parameters())
        .await
        .expect_err("second connect should fail");
    assert!(matches!(err, Error::AlreadyConnected(_)));
}

#[tokio::test]
async fn test_broadcast_excludes_producer() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, mut rx_a, _) = join(&coordinator, &room_id, "alice").await;
    let (_bob, mut rx_b, _) = join(&coordinator, &room_id, "bob").await;
    let (_carol, mut rx_c, _) = join(&coordinator, &room_id, "carol").await;

    // Drain the join notifications
    expect_event(&mut rx_a).await;
    expect_event(&mut rx_a).await;
    expect_event(&mut rx_b).await;

    connected_send_transport(&coordinator, &room_id, &alice).await;
    let producer_id = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect("produce");

    for rx in [&mut rx_b, &mut rx_c] {
        match expect_event(rx).await {
            SignalEvent::NewProducer {
                producer_id: announced,
                ..
            } => assert_eq!(announced, producer_id),
            other => panic!("expected new_producer, got {other:?}"),
        }
    }
    assert_no_event(&mut rx_a).await;
}

#[tokio::test]
async fn test_consume_rejects_incompatible_capabilities() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, _rx_a, _) = join(&coordinator, &room_id, "alice").await;
    let (bob, mut rx_b, _) = join(&coordinator, &room_id, "bob").await;

    connected_send_transport(&coordinator, &room_id, &alice).await;
    let producer_id = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect("produce");
    expect_event(&mut rx_b).await;

    connected_recv_transport(&coordinator, &room_id, &bob).await;
    let err = coordinator
        .consume(&room_id, &bob, &producer_id, opus_capabilities())
        .await
        .expect_err("audio-only capabilities cannot consume VP8");
    assert!(matches!(err, Error::IncompatibleCapabilities));
}

#[tokio::test]
async fn test_consume_preconditions() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, _rx_a, _) = join(&coordinator, &room_id, "alice").await;
    let (bob, mut rx_b, _) = join(&coordinator, &room_id, "bob").await;

    connected_send_transport(&coordinator, &room_id, &alice).await;
    let producer_id = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect("produce");
    expect_event(&mut rx_b).await;

    // No receive transport yet
    let err = coordinator
        .consume(&room_id, &bob, &producer_id, vp8_capabilities())
        .await
        .expect_err("consume without receive transport should fail");
    assert!(matches!(err, Error::RecvTransportNotFound));

    // Unknown producer
    connected_recv_transport(&coordinator, &room_id, &bob).await;
    let err = coordinator
        .consume(
            &room_id,
            &bob,
            &huddle_core::ProducerId::from("missing"),
            vp8_capabilities(),
        )
        .await
        .expect_err("unknown producer should fail");
    assert!(matches!(err, Error::ProducerNotFound(_)));
}

#[tokio::test]
async fn test_disconnect_cleans_up_and_is_idempotent() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, _rx_a, _) = join(&coordinator, &room_id, "alice").await;
    let (bob, mut rx_b, _) = join(&coordinator, &room_id, "bob").await;

    connected_send_transport(&coordinator, &room_id, &alice).await;
    let producer_id = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect("produce");
    expect_event(&mut rx_b).await;

    coordinator.disconnect(&room_id, &alice).await;

    // Bob sees the producer close, then the departure, then silence
    match expect_event(&mut rx_b).await {
        SignalEvent::ProducerClosed {
            producer_id: closed,
            ..
        } => assert_eq!(closed, producer_id),
        other => panic!("expected producer_closed, got {other:?}"),
    }
    match expect_event(&mut rx_b).await {
        SignalEvent::ParticipantLeft { participant_id, .. } => {
            assert_eq!(participant_id, alice);
        }
        other => panic!("expected participant_left, got {other:?}"),
    }

    let room = coordinator.registry().get_room(&room_id).expect("room");
    let snapshot = room.snapshot().await;
    assert_eq!(snapshot.participants, vec![bob.clone()]);
    assert!(snapshot.transports.is_empty());
    assert!(snapshot.producers.is_empty());

    // Running the handler again produces the same final state and no events
    coordinator.disconnect(&room_id, &alice).await;
    assert_no_event(&mut rx_b).await;
    let snapshot = room.snapshot().await;
    assert_eq!(snapshot.participants, vec![bob]);

    // Requests under the departed identity are refused
    let err = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect_err("produce after disconnect should fail");
    assert!(matches!(err, Error::ParticipantGone));
}

#[tokio::test]
async fn test_rejoin_after_disconnect_frees_role_slots() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, _rx, _) = join(&coordinator, &room_id, "alice").await;
    connected_send_transport(&coordinator, &room_id, &alice).await;
    coordinator.disconnect(&room_id, &alice).await;

    let (alice, _rx, joined) = join(&coordinator, &room_id, "alice").await;
    assert!(joined.producers.is_empty());
    coordinator
        .create_transport(&room_id, &alice, TransportRole::Send)
        .await
        .expect("send slot should be free after disconnect");
}

#[tokio::test]
async fn test_late_joiner_sees_existing_producers() {
    let coordinator = test_coordinator();
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, _rx_a, _) = join(&coordinator, &room_id, "alice").await;
    connected_send_transport(&coordinator, &room_id, &alice).await;
    let producer_id = coordinator
        .produce(&room_id, &alice, MediaKind::Video, vp8_rtp_parameters())
        .await
        .expect("produce");

    let (_carol, _rx_c, joined) = join(&coordinator, &room_id, "carol").await;
    assert_eq!(joined.producers.len(), 1);
    assert_eq!(joined.producers[0].producer_id, producer_id);
    assert_eq!(joined.producers[0].participant_id, alice);
    assert_eq!(joined.producers[0].kind, MediaKind::Video);
}

#[tokio::test]
async fn test_empty_room_survives_reconnection_gap() {
    let mut config = test_config();
    config.rooms.empty_room_grace_secs = 3600;
    let coordinator = coordinator_with_config(config);
    let room_id = coordinator.create_room().await.expect("room");

    let (alice, _rx, _) = join(&coordinator, &room_id, "alice").await;
    coordinator.disconnect(&room_id, &alice).await;

    // Room is idle but inside the grace period: still joinable
    assert_eq!(coordinator.registry().cleanup_empty_rooms().await, 0);
    let (_alice, _rx, _) = join(&coordinator, &room_id, "alice").await;
    assert_eq!(coordinator.registry().room_count(), 1);
}
