//! Test helpers and fixtures
//!
//! Common utilities to reduce boilerplate across unit and integration
//! tests: fixture IDs, capability/parameter JSON builders, and a ready-made
//! coordinator wired to the loopback engine.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::coordinator::SignalingCoordinator;
use crate::engine::LoopbackEngine;
use crate::events::{EventReceiver, SignalEvent};
use crate::registry::SessionRegistry;
use crate::types::{ParticipantId, RoomId};

/// Create a test participant ID
pub fn test_participant_id(id: &str) -> ParticipantId {
    ParticipantId::from_string(id.to_string())
}

/// Create a test room ID
pub fn test_room_id(id: &str) -> RoomId {
    RoomId::from_string(id.to_string())
}

/// Default config for tests
pub fn test_config() -> Config {
    Config::default()
}

/// Coordinator wired to a ready loopback engine with default config
pub fn test_coordinator() -> Arc<SignalingCoordinator> {
    coordinator_with_config(test_config())
}

/// Coordinator wired to a ready loopback engine with the given config
pub fn coordinator_with_config(config: Config) -> Arc<SignalingCoordinator> {
    let registry = SessionRegistry::new(Arc::new(LoopbackEngine::new()), Arc::new(config));
    Arc::new(SignalingCoordinator::new(registry))
}

/// RTP parameters for a VP8 video producer
pub fn vp8_rtp_parameters() -> Value {
    json!({
        "codecs": [{
            "mimeType": "video/VP8",
            "payloadType": 101,
            "clockRate": 90000,
        }],
        "encodings": [{ "ssrc": 1111 }],
    })
}

/// RTP parameters for an opus audio producer
pub fn opus_rtp_parameters() -> Value {
    json!({
        "codecs": [{
            "mimeType": "audio/opus",
            "payloadType": 100,
            "clockRate": 48000,
            "channels": 2,
        }],
        "encodings": [{ "ssrc": 2222 }],
    })
}

/// Capabilities declaring VP8 video support only
pub fn vp8_capabilities() -> Value {
    json!({ "codecs": [{ "mimeType": "video/VP8", "clockRate": 90000 }] })
}

/// Capabilities declaring opus audio support only
pub fn opus_capabilities() -> Value {
    json!({ "codecs": [{ "mimeType": "audio/opus", "clockRate": 48000, "channels": 2 }] })
}

/// Capabilities declaring both default codecs
pub fn full_capabilities() -> Value {
    json!({
        "codecs": [
            { "mimeType": "audio/opus", "clockRate": 48000, "channels": 2 },
            { "mimeType": "video/VP8", "clockRate": 90000 },
        ]
    })
}

/// Client-side DTLS parameters for connect calls
pub fn dtls_parameters() -> Value {
    json!({
        "role": "client",
        "fingerprints": [{ "algorithm": "sha-256", "value": "00:11:22:33" }],
    })
}

/// Receive the next event or panic after a short timeout
pub async fn expect_event(rx: &mut EventReceiver) -> SignalEvent {
    tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert that no event arrives within a short window
pub async fn assert_no_event(rx: &mut EventReceiver) {
    match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
        Err(_) | Ok(None) => {}
        Ok(Some(event)) => panic!("unexpected event: {event:?}"),
    }
}
