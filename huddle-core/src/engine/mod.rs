//! Capability gateway - the media-routing engine's call surface
//!
//! The actual RTP/RTCP routing, ICE/DTLS negotiation and codec handling live
//! in an external media engine. This module defines the trait surface the
//! coordinator consumes: routers scoped to a codec set, transports created
//! under a router, producer/consumer handles, and the capability
//! compatibility check performed before a consumer is created.
//!
//! Negotiation payloads (ICE/DTLS/RTP parameter blobs) are opaque to the
//! coordinator and ride through as `serde_json::Value`.

mod loopback;

pub use loopback::LoopbackEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{MediaCodec, MediaConfig};
use crate::error::Result;
use crate::types::{ConsumerId, MediaKind, ProducerId, TransportId};

/// Options for creating a WebRTC transport under a router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcTransportOptions {
    pub listen_ip: String,
    pub announced_ip: Option<String>,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
}

impl From<&MediaConfig> for WebRtcTransportOptions {
    fn from(config: &MediaConfig) -> Self {
        Self {
            listen_ip: config.listen_ip.clone(),
            announced_ip: config.announced_ip.clone(),
            rtc_min_port: config.rtc_min_port,
            rtc_max_port: config.rtc_max_port,
            enable_udp: config.enable_udp,
            enable_tcp: config.enable_tcp,
            prefer_udp: config.prefer_udp,
        }
    }
}

/// Connection-negotiation parameters returned to the requesting client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportParams {
    pub id: TransportId,
    pub ice_parameters: Value,
    pub ice_candidates: Value,
    pub dtls_parameters: Value,
}

/// Parameters for a created consumer, returned to the requesting client only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerParams {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

/// Entry point into the media engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a router scoped to the given static codec configuration.
    ///
    /// Fails with `EngineUnavailable` when the engine is not ready (e.g. its
    /// worker process has not finished initializing).
    async fn create_router(&self, codecs: &[MediaCodec]) -> Result<Arc<dyn RouterHandle>>;
}

/// A per-room router describing the negotiated media capabilities
#[async_trait]
pub trait RouterHandle: Send + Sync {
    /// Capability descriptor announced to joining participants
    fn rtp_capabilities(&self) -> Value;

    async fn create_transport(
        &self,
        options: &WebRtcTransportOptions,
    ) -> Result<Arc<dyn TransportHandle>>;

    /// Whether the declared remote capabilities can consume the given
    /// producer (codec/profile intersection).
    async fn can_consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: &Value,
    ) -> Result<bool>;
}

/// A participant's negotiated network path to the engine
#[async_trait]
pub trait TransportHandle: Send + Sync {
    fn id(&self) -> TransportId;

    /// Negotiation parameters handed back to the creating participant
    fn params(&self) -> TransportParams;

    /// Complete DTLS negotiation with the client-supplied parameters.
    /// Called exactly once per transport; failures surface as `ConnectFailed`.
    async fn connect(&self, dtls_parameters: Value) -> Result<()>;

    /// Publish a media stream on this (send) transport
    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<Arc<dyn ProducerHandle>>;

    /// Create a consumer on this (receive) transport for a producer
    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<ConsumerParams>;

    /// Close the transport. The engine guarantees this also invalidates any
    /// producers/consumers anchored to it.
    async fn close(&self) -> Result<()>;
}

/// A published media stream owned by a send transport
#[async_trait]
pub trait ProducerHandle: Send + Sync {
    fn id(&self) -> ProducerId;
    fn kind(&self) -> MediaKind;
    fn rtp_parameters(&self) -> Value;
    async fn close(&self) -> Result<()>;
}
