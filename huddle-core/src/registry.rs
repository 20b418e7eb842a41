//! Session registry - single source of truth for room existence and composition
//!
//! Rooms live in a concurrent map for lock-free cross-room access; each
//! room's own composition is serialized behind its state lock. The registry
//! also runs the lazy empty-room cleanup sweep.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::{MediaEngine, ProducerHandle, TransportHandle};
use crate::error::{Error, Result};
use crate::room::Room;
use crate::types::{ProducerId, RoomId, TransportId};

/// Aggregated registry statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub total_participants: usize,
    pub total_transports: usize,
    pub total_producers: usize,
}

pub struct SessionRegistry {
    engine: Arc<dyn MediaEngine>,
    config: Arc<Config>,
    rooms: DashMap<RoomId, Arc<Room>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(engine: Arc<dyn MediaEngine>, config: Arc<Config>) -> Arc<Self> {
        let registry = Arc::new(Self {
            engine,
            config,
            rooms: DashMap::new(),
        });

        info!(
            max_rooms = registry.config.rooms.max_rooms,
            max_participants_per_room = registry.config.rooms.max_participants_per_room,
            "Session registry initialized"
        );

        registry
    }

    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    /// Create a room with a router scoped to the configured codec list
    pub async fn create_room(&self) -> Result<Arc<Room>> {
        // Enforce room limit (0 = unlimited) before asking the engine for
        // a router
        let max_rooms = self.config.rooms.max_rooms;
        if max_rooms > 0 && self.rooms.len() >= max_rooms {
            return Err(Error::RoomLimitReached);
        }

        let router = self.engine.create_router(&self.config.media.codecs).await?;
        let id = RoomId::new();
        let room = Arc::new(Room::new(id.clone(), router));
        self.rooms.insert(id.clone(), Arc::clone(&room));

        info!(
            room_id = %id,
            total_rooms = self.rooms.len(),
            "Created room"
        );

        Ok(room)
    }

    pub fn get_room(&self, id: &RoomId) -> Result<Arc<Room>> {
        self.rooms
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::RoomNotFound(id.clone()))
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Remove a transport from a room and its binding slot.
    ///
    /// Idempotent: removing an absent transport (or from an absent room) is
    /// a no-op, so explicit close and disconnect cleanup can race without
    /// erroring. Returns the removed handle, if this call was the one that
    /// removed it, so exactly one caller closes it at the gateway.
    pub async fn remove_transport(
        &self,
        room_id: &RoomId,
        transport_id: &TransportId,
    ) -> Option<Arc<dyn TransportHandle>> {
        let room = self.rooms.get(room_id).map(|e| Arc::clone(e.value()))?;
        let mut state = room.lock().await;
        let entry = state.transports.remove(transport_id)?;
        state.bindings.unbind_transport(transport_id);
        state.update_idle_marker();
        debug!(
            room_id = %room_id,
            transport_id = %transport_id,
            "Removed transport"
        );
        Some(entry.handle)
    }

    /// Remove a producer from a room. Same idempotence contract as
    /// [`remove_transport`](Self::remove_transport).
    pub async fn remove_producer(
        &self,
        room_id: &RoomId,
        producer_id: &ProducerId,
    ) -> Option<Arc<dyn ProducerHandle>> {
        let room = self.rooms.get(room_id).map(|e| Arc::clone(e.value()))?;
        let mut state = room.lock().await;
        let entry = state.producers.remove(producer_id)?;
        debug!(
            room_id = %room_id,
            producer_id = %producer_id,
            "Removed producer"
        );
        Some(entry.handle)
    }

    /// Discard rooms that have been idle for at least the configured grace
    /// period. Returns how many rooms were removed.
    pub async fn cleanup_empty_rooms(&self) -> usize {
        let grace = Duration::from_secs(self.config.rooms.empty_room_grace_secs);
        let mut to_remove = Vec::new();

        // Snapshot the room list first; room locks are never awaited while
        // a map shard is held
        let rooms: Vec<(RoomId, Arc<Room>)> = self
            .rooms
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (room_id, room) in rooms {
            let mut state = room.lock().await;
            state.update_idle_marker();
            if let Some(empty_since) = state.empty_since {
                if empty_since.elapsed() >= grace {
                    to_remove.push(room_id);
                }
            }
        }

        let mut removed = 0;
        for room_id in to_remove {
            self.rooms.remove(&room_id);
            removed += 1;
            debug!(room_id = %room_id, "Removed idle room");
        }

        if removed > 0 {
            info!(
                removed,
                remaining_rooms = self.rooms.len(),
                "Cleaned up idle rooms"
            );
        }

        removed
    }

    /// Spawn the periodic cleanup sweep
    pub fn spawn_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.rooms.cleanup_interval_secs);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            info!(interval_secs = period.as_secs(), "Starting room cleanup task");
            loop {
                ticker.tick().await;
                self.cleanup_empty_rooms().await;
            }
        })
    }

    /// Aggregate statistics across all rooms
    pub async fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            active_rooms: self.rooms.len(),
            ..Default::default()
        };

        let rooms: Vec<Arc<Room>> = self
            .rooms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for room in rooms {
            let room_stats = room.stats().await;
            stats.total_participants += room_stats.participants;
            stats.total_transports += room_stats.transports;
            stats.total_producers += room_stats.producers;
        }

        stats
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
