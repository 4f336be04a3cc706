//! Snapshot Replication
//!
//! The server ships its confirmed world to clients as a [`WorldSnapshot`].
//! A client restores from it and replays its own inputs on top.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::tick::SimulationTick;
use crate::core::vec2::FixedVec2;
use crate::game::state::{EntityId, EntityKind, HitPoints, SimWorld, TeamType};
use crate::network::protocol::ServerMessage;

/// Replication errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// Snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Payload tick disagrees with the envelope.
    #[error("snapshot tick mismatch: envelope {envelope}, payload {payload}")]
    TickMismatch {
        /// Tick on the message
        envelope: SimulationTick,
        /// Tick inside the payload
        payload: SimulationTick,
    },
}

/// Confirmed world state at a tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick the world was captured after
    pub tick: SimulationTick,
    /// The world
    pub world: SimWorld,
}

/// What a client sees of one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityView {
    /// Kind
    pub kind: EntityKind,
    /// Team
    pub team: TeamType,
    /// Position
    pub position: FixedVec2,
    /// Hit points, if any
    pub hit_points: Option<HitPoints>,
    /// Marked for destruction
    pub destroying: bool,
}

/// Entity-level changes between two snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Present now, absent in the baseline
    pub spawned: Vec<EntityId>,
    /// Present in the baseline, absent now
    pub despawned: Vec<EntityId>,
    /// Present in both with different views
    pub changed: Vec<EntityId>,
}

impl SnapshotDiff {
    /// No entity changed.
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.despawned.is_empty() && self.changed.is_empty()
    }
}

impl WorldSnapshot {
    /// Capture `world` as confirmed at `tick`.
    pub fn capture(tick: SimulationTick, world: &SimWorld) -> Self {
        let mut world = world.clone();
        world.pending_events.clear();
        world.committed_this_pass.clear();
        Self { tick, world }
    }

    /// Encode to bincode.
    pub fn encode(&self) -> Result<Vec<u8>, ReplicationError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode.
    pub fn decode(bytes: &[u8]) -> Result<Self, ReplicationError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Wrap into a server message.
    pub fn to_message(&self) -> Result<ServerMessage, ReplicationError> {
        Ok(ServerMessage::Snapshot {
            tick: self.tick,
            payload: self.encode()?,
        })
    }

    /// Unwrap a [`ServerMessage::Snapshot`] envelope.
    pub fn from_message(tick: SimulationTick, payload: &[u8]) -> Result<Self, ReplicationError> {
        let snapshot = Self::decode(payload)?;
        if snapshot.tick != tick {
            return Err(ReplicationError::TickMismatch {
                envelope: tick,
                payload: snapshot.tick,
            });
        }
        Ok(snapshot)
    }

    /// Per-entity views, sorted by id.
    pub fn entity_views(&self) -> BTreeMap<EntityId, EntityView> {
        let world = &self.world;
        world
            .kinds
            .iter()
            .map(|(id, kind)| {
                let view = EntityView {
                    kind: *kind,
                    team: world.team_of(*id),
                    position: world.positions.get(id).copied().unwrap_or_default(),
                    hit_points: world.hit_points.get(id).copied(),
                    destroying: world.destroy_tags.contains(id),
                };
                (*id, view)
            })
            .collect()
    }

    /// Entity changes since `baseline`.
    pub fn diff(&self, baseline: &WorldSnapshot) -> SnapshotDiff {
        let now = self.entity_views();
        let before = baseline.entity_views();
        let mut diff = SnapshotDiff::default();

        for (id, view) in &now {
            match before.get(id) {
                None => diff.spawned.push(*id),
                Some(old) if old != view => diff.changed.push(*id),
                Some(_) => {}
            }
        }
        diff.despawned = before.keys().filter(|id| !now.contains_key(id)).copied().collect();
        diff
    }
}
