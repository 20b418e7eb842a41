//! In-process capability gateway used by tests and standalone mode
//!
//! Mints IDs, fabricates ICE/DTLS negotiation blobs from the configured
//! listen-port range, and answers `can_consume` with a MIME-type
//! intersection between the declared capabilities and the producer's
//! negotiated codecs. A production media engine implements the same traits
//! out of tree.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use super::{
    ConsumerParams, MediaEngine, ProducerHandle, RouterHandle, TransportHandle, TransportParams,
    WebRtcTransportOptions,
};
use crate::config::MediaCodec;
use crate::error::{Error, Result};
use crate::types::{generate_id, ConsumerId, MediaKind, ProducerId, TransportId};

pub struct LoopbackEngine {
    ready: AtomicBool,
}

impl LoopbackEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
        }
    }

    /// An engine that reports `EngineUnavailable` until `set_ready(true)`
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for LoopbackEngine {
    async fn create_router(&self, codecs: &[MediaCodec]) -> Result<Arc<dyn RouterHandle>> {
        if !self.ready.load(Ordering::Relaxed) {
            return Err(Error::EngineUnavailable(
                "worker not initialized".to_string(),
            ));
        }
        Ok(Arc::new(LoopbackRouter::new(codecs.to_vec())))
    }
}

struct ProducerRecord {
    kind: MediaKind,
    rtp_parameters: Value,
}

/// Shared router state: the codec scope plus every live producer created
/// under it, so transports and the compatibility check see one source of
/// truth.
struct RouterShared {
    producers: DashMap<ProducerId, ProducerRecord>,
    next_port_offset: AtomicU16,
}

struct LoopbackRouter {
    shared: Arc<RouterShared>,
    rtp_capabilities: Value,
}

impl LoopbackRouter {
    fn new(codecs: Vec<MediaCodec>) -> Self {
        let codec_caps: Vec<Value> = codecs
            .iter()
            .map(|c| {
                let mut cap = json!({
                    "kind": c.kind,
                    "mimeType": c.mime_type.clone(),
                    "clockRate": c.clock_rate,
                    "parameters": c.parameters.clone(),
                });
                if let Some(channels) = c.channels {
                    cap["channels"] = json!(channels);
                }
                cap
            })
            .collect();

        Self {
            shared: Arc::new(RouterShared {
                producers: DashMap::new(),
                next_port_offset: AtomicU16::new(0),
            }),
            rtp_capabilities: json!({
                "codecs": codec_caps,
                "headerExtensions": [],
            }),
        }
    }
}

#[async_trait]
impl RouterHandle for LoopbackRouter {
    fn rtp_capabilities(&self) -> Value {
        self.rtp_capabilities.clone()
    }

    async fn create_transport(
        &self,
        options: &WebRtcTransportOptions,
    ) -> Result<Arc<dyn TransportHandle>> {
        let id = TransportId::new();
        let span = u32::from(options.rtc_max_port) - u32::from(options.rtc_min_port) + 1;
        let offset =
            u32::from(self.shared.next_port_offset.fetch_add(1, Ordering::Relaxed)) % span;
        let port = options.rtc_min_port + offset as u16;
        let ip = options
            .announced_ip
            .clone()
            .unwrap_or_else(|| options.listen_ip.clone());

        let mut candidates = Vec::new();
        if options.enable_udp {
            candidates.push(json!({
                "foundation": "udpcandidate",
                "ip": ip.clone(),
                "port": port,
                "priority": 1_076_302_079_u32,
                "protocol": "udp",
                "type": "host",
            }));
        }
        if options.enable_tcp {
            candidates.push(json!({
                "foundation": "tcpcandidate",
                "ip": ip,
                "port": port,
                "priority": 1_076_302_078_u32,
                "protocol": "tcp",
                "type": "host",
            }));
        }
        if !options.prefer_udp {
            candidates.reverse();
        }

        let params = TransportParams {
            id: id.clone(),
            ice_parameters: json!({
                "usernameFragment": generate_id(),
                "password": format!("{}{}", generate_id(), generate_id()),
                "iceLite": true,
            }),
            ice_candidates: Value::Array(candidates),
            dtls_parameters: json!({
                "role": "auto",
                "fingerprints": [{
                    "algorithm": "sha-256",
                    "value": pseudo_fingerprint(id.as_str()),
                }],
            }),
        };

        Ok(Arc::new(LoopbackTransport {
            id,
            params,
            shared: Arc::clone(&self.shared),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            own_producers: Mutex::new(Vec::new()),
        }))
    }

    async fn can_consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: &Value,
    ) -> Result<bool> {
        let Some(record) = self.shared.producers.get(producer_id) else {
            return Ok(false);
        };
        let produced = mime_types(&record.rtp_parameters);
        let declared = mime_types(rtp_capabilities);
        Ok(produced.iter().any(|m| declared.contains(m)))
    }
}

struct LoopbackTransport {
    id: TransportId,
    params: TransportParams,
    shared: Arc<RouterShared>,
    connected: AtomicBool,
    closed: AtomicBool,
    own_producers: Mutex<Vec<ProducerId>>,
}

#[async_trait]
impl TransportHandle for LoopbackTransport {
    fn id(&self) -> TransportId {
        self.id.clone()
    }

    fn params(&self) -> TransportParams {
        self.params.clone()
    }

    async fn connect(&self, dtls_parameters: Value) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::ConnectFailed("transport is closed".to_string()));
        }
        if !dtls_parameters.is_object() {
            return Err(Error::ConnectFailed(
                "malformed dtls parameters".to_string(),
            ));
        }
        if self.connected.swap(true, Ordering::Relaxed) {
            return Err(Error::AlreadyConnected(self.id.clone()));
        }
        Ok(())
    }

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<Arc<dyn ProducerHandle>> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::TransportNotFound(self.id.clone()));
        }
        if !rtp_parameters
            .get("codecs")
            .is_some_and(Value::is_array)
        {
            return Err(Error::InvalidInput(
                "rtp_parameters must include a codecs array".to_string(),
            ));
        }

        let id = ProducerId::new();
        self.shared.producers.insert(
            id.clone(),
            ProducerRecord {
                kind,
                rtp_parameters: rtp_parameters.clone(),
            },
        );
        self.own_producers.lock().push(id.clone());

        Ok(Arc::new(LoopbackProducer {
            id,
            kind,
            rtp_parameters,
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<ConsumerParams> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::TransportNotFound(self.id.clone()));
        }
        let Some(record) = self.shared.producers.get(producer_id) else {
            return Err(Error::ProducerNotFound(producer_id.clone()));
        };
        let produced = mime_types(&record.rtp_parameters);
        let declared = mime_types(&rtp_capabilities);
        if !produced.iter().any(|m| declared.contains(m)) {
            return Err(Error::IncompatibleCapabilities);
        }
        Ok(ConsumerParams {
            id: ConsumerId::new(),
            producer_id: producer_id.clone(),
            kind: record.kind,
            rtp_parameters: record.rtp_parameters.clone(),
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        // Closing a transport invalidates every producer anchored to it
        for producer_id in self.own_producers.lock().drain(..) {
            self.shared.producers.remove(&producer_id);
        }
        Ok(())
    }
}

struct LoopbackProducer {
    id: ProducerId,
    kind: MediaKind,
    rtp_parameters: Value,
    shared: Arc<RouterShared>,
}

#[async_trait]
impl ProducerHandle for LoopbackProducer {
    fn id(&self) -> ProducerId {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn rtp_parameters(&self) -> Value {
        self.rtp_parameters.clone()
    }

    async fn close(&self) -> Result<()> {
        self.shared.producers.remove(&self.id);
        Ok(())
    }
}

/// Lowercased MIME types listed under a parameter blob's "codecs" array
fn mime_types(value: &Value) -> Vec<String> {
    value
        .get("codecs")
        .and_then(Value::as_array)
        .map(|codecs| {
            codecs
                .iter()
                .filter_map(|c| c.get("mimeType").and_then(Value::as_str))
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

/// Deterministic sha-256-shaped fingerprint derived from the transport ID
fn pseudo_fingerprint(seed: &str) -> String {
    let mut bytes = Vec::with_capacity(32);
    let mut counter = 0u64;
    while bytes.len() < 32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        seed.hash(&mut hasher);
        counter.hash(&mut hasher);
        bytes.extend_from_slice(&hasher.finish().to_be_bytes());
        counter += 1;
    }
    bytes
        .iter()
        .take(32)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
