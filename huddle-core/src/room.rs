//! Room state: the per-room composition the registry owns
//!
//! A room bundles the router negotiated for it with the transports,
//! producers, binding table and broadcast membership that hang off it. All
//! of that mutable composition sits behind one async mutex per room: every
//! read-modify-write - including the ones that suspend on a gateway call in
//! the middle - runs to completion before the next one starts, and rooms
//! never share locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

use crate::bindings::BindingTable;
use crate::engine::{ProducerHandle, RouterHandle, TransportHandle};
use crate::events::EventSender;
use crate::types::{MediaKind, ParticipantId, ProducerId, RoomId, TransportId, TransportRole};

pub struct Room {
    id: RoomId,
    router: Arc<dyn RouterHandle>,
    state: Mutex<RoomState>,
    created_at: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn new(id: RoomId, router: Arc<dyn RouterHandle>) -> Self {
        Self {
            id,
            router,
            state: Mutex::new(RoomState::new()),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    #[must_use]
    pub fn router(&self) -> &Arc<dyn RouterHandle> {
        &self.router
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Acquire the room's serialization lock. Held across gateway calls by
    /// design; see the module docs.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    pub async fn stats(&self) -> RoomStats {
        let state = self.state.lock().await;
        RoomStats {
            participants: state.members.len(),
            transports: state.transports.len(),
            producers: state.producers.len(),
        }
    }

    /// Point-in-time view of the room's composition
    pub async fn snapshot(&self) -> RoomSnapshot {
        let state = self.state.lock().await;
        RoomSnapshot {
            id: self.id.clone(),
            created_at: self.created_at(),
            participants: state.members.keys().cloned().collect(),
            transports: state
                .transports
                .iter()
                .map(|(id, entry)| TransportSnapshot {
                    id: id.clone(),
                    owner: entry.owner.clone(),
                    role: entry.role,
                    connected: entry.connected,
                })
                .collect(),
            producers: state
                .producers
                .iter()
                .map(|(id, entry)| ProducerSnapshot {
                    id: id.clone(),
                    owner: entry.owner.clone(),
                    kind: entry.kind,
                    transport_id: entry.transport_id.clone(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("id", &self.id).finish()
    }
}

/// A transport registered in a room
pub(crate) struct TransportEntry {
    pub owner: ParticipantId,
    pub role: TransportRole,
    pub connected: bool,
    pub handle: Arc<dyn TransportHandle>,
}

/// A producer registered in a room
pub(crate) struct ProducerEntry {
    pub owner: ParticipantId,
    pub kind: MediaKind,
    pub transport_id: TransportId,
    pub handle: Arc<dyn ProducerHandle>,
}

pub(crate) struct RoomState {
    pub transports: HashMap<TransportId, TransportEntry>,
    pub producers: HashMap<ProducerId, ProducerEntry>,
    pub bindings: BindingTable,
    pub members: HashMap<ParticipantId, EventSender>,
    /// When the room last became idle; cleared by any join or transport
    /// creation, consulted by the registry's cleanup sweep
    pub empty_since: Option<Instant>,
}

impl RoomState {
    fn new() -> Self {
        Self {
            transports: HashMap::new(),
            producers: HashMap::new(),
            bindings: BindingTable::new(),
            members: HashMap::new(),
            empty_since: None,
        }
    }

    /// No members and no transports - eligible for lazy eviction
    pub fn is_idle(&self) -> bool {
        self.members.is_empty() && self.transports.is_empty()
    }

    /// Record the idle transition, if any, for the cleanup sweep
    pub fn update_idle_marker(&mut self) {
        if self.is_idle() {
            if self.empty_since.is_none() {
                self.empty_since = Some(Instant::now());
            }
        } else {
            self.empty_since = None;
        }
    }

    /// Recipient list for a broadcast that excludes the acting participant
    pub fn recipients_except(
        &self,
        excluded: &ParticipantId,
    ) -> Vec<(ParticipantId, EventSender)> {
        self.members
            .iter()
            .filter(|(id, _)| *id != excluded)
            .map(|(id, sender)| (id.clone(), sender.clone()))
            .collect()
    }

    /// Current producers, as announced to joining participants
    pub fn producer_infos(&self) -> Vec<ProducerInfo> {
        self.producers
            .iter()
            .map(|(id, entry)| ProducerInfo {
                producer_id: id.clone(),
                participant_id: entry.owner.clone(),
                kind: entry.kind,
            })
            .collect()
    }
}

/// A producer as advertised to other participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    pub participant_id: ParticipantId,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomStats {
    pub participants: usize,
    pub transports: usize,
    pub producers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ParticipantId>,
    pub transports: Vec<TransportSnapshot>,
    pub producers: Vec<ProducerSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub id: TransportId,
    pub owner: ParticipantId,
    pub role: TransportRole,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerSnapshot {
    pub id: ProducerId,
    pub owner: ParticipantId,
    pub kind: MediaKind,
    pub transport_id: TransportId,
}
