//! Per-room transport binding table
//!
//! Indexes a room's transports by (participant, role) and enforces the
//! at-most-one-open-transport-per-role invariant. Lives inside the room's
//! serialized state, so every mutation happens under the room lock.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{ParticipantId, TransportId, TransportRole};

#[derive(Debug, Default)]
pub struct BindingTable {
    slots: HashMap<(ParticipantId, TransportRole), TransportId>,
}

impl BindingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the (participant, role) slot for a transport.
    ///
    /// Fails with `RoleAlreadyBound` when a live transport already occupies
    /// the slot - the mechanism that keeps "find my send transport"
    /// unambiguous and surfaces duplicate transport creation by buggy
    /// clients.
    pub fn bind(
        &mut self,
        participant: &ParticipantId,
        role: TransportRole,
        transport_id: TransportId,
    ) -> Result<()> {
        let key = (participant.clone(), role);
        if self.slots.contains_key(&key) {
            return Err(Error::RoleAlreadyBound { role });
        }
        self.slots.insert(key, transport_id);
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, participant: &ParticipantId, role: TransportRole) -> Option<&TransportId> {
        self.slots.get(&(participant.clone(), role))
    }

    /// Release whatever slot holds the given transport, if any
    pub fn unbind_transport(&mut self, transport_id: &TransportId) {
        self.slots.retain(|_, bound| bound != transport_id);
    }

    /// Release every slot held by the participant, returning the transports
    /// that were bound so the caller can close them at the gateway
    pub fn unbind_all_for(&mut self, participant: &ParticipantId) -> Vec<TransportId> {
        let mut removed = Vec::new();
        self.slots.retain(|(owner, _), bound| {
            if owner == participant {
                removed.push(bound.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
