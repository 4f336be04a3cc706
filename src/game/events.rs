//! Game Events
//!
//! Events generated during a simulation pass, for logging and for the
//! presentation layer. They describe what happened; state never depends on
//! them.

use serde::{Serialize, Deserialize};

use crate::core::tick::SimulationTick;
use crate::game::clock::ConnectionId;
use crate::game::state::{AbilityKind, EntityId, EntityKind, Lane, TeamType};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Session transitions first
    Session = 0,
    /// Then destruction
    Destruction = 1,
    /// Then damage
    Damage = 2,
    /// Then ability and attack spawns
    Ability = 3,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Champion used an ability
    AbilityCast {
        caster: EntityId,
        ability: AbilityKind,
        spawned: EntityId,
    },

    /// Champion started aiming a skill shot
    SkillShotAimStarted { caster: EntityId },

    /// Skill shot aim cancelled
    SkillShotAimCancelled { caster: EntityId },

    /// NPC fired at a target
    NpcAttack {
        attacker: EntityId,
        target: EntityId,
        projectile: EntityId,
    },

    /// Minion entered its lane
    MinionSpawned {
        minion: EntityId,
        lane: Lane,
        team: TeamType,
    },

    /// Committed damage was applied
    DamageApplied {
        entity: EntityId,
        amount: i32,
        remaining: i32,
    },

    /// Entity was marked for destruction
    DestroyTagged { entity: EntityId },

    /// Entity was removed (server)
    EntityDestroyed { entity: EntityId, kind: EntityKind },

    /// Entity was parked out of the world (client)
    EntityHidden { entity: EntityId },

    /// Champion respawn scheduled
    RespawnQueued {
        connection: ConnectionId,
        respawn_tick: SimulationTick,
    },

    /// Champion respawned
    Respawned {
        connection: ConnectionId,
        champion: EntityId,
    },

    /// Player entered the game
    PlayerJoined {
        connection: ConnectionId,
        team: TeamType,
        champion: EntityId,
    },

    /// Countdown to game start began
    CountdownStarted { target_tick: SimulationTick },

    /// Game is now being played
    GameStarted,

    /// Game ended
    GameOver { winner: TeamType },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: SimulationTick,

    /// Processing priority
    pub priority: EventPriority,

    /// Entity involved (for tie-breaking)
    pub entity: Option<EntityId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: SimulationTick, priority: EventPriority, data: GameEventData) -> Self {
        let entity = match &data {
            GameEventData::AbilityCast { caster, .. } => Some(*caster),
            GameEventData::SkillShotAimStarted { caster } => Some(*caster),
            GameEventData::SkillShotAimCancelled { caster } => Some(*caster),
            GameEventData::NpcAttack { attacker, .. } => Some(*attacker),
            GameEventData::MinionSpawned { minion, .. } => Some(*minion),
            GameEventData::DamageApplied { entity, .. } => Some(*entity),
            GameEventData::DestroyTagged { entity } => Some(*entity),
            GameEventData::EntityDestroyed { entity, .. } => Some(*entity),
            GameEventData::EntityHidden { entity } => Some(*entity),
            GameEventData::Respawned { champion, .. } => Some(*champion),
            GameEventData::PlayerJoined { champion, .. } => Some(*champion),
            _ => None,
        };

        Self {
            tick,
            priority,
            entity,
            data,
        }
    }

    /// Create ability cast event.
    pub fn ability_cast(tick: SimulationTick, caster: EntityId, ability: AbilityKind, spawned: EntityId) -> Self {
        Self::new(tick, EventPriority::Ability, GameEventData::AbilityCast { caster, ability, spawned })
    }

    /// Create NPC attack event.
    pub fn npc_attack(tick: SimulationTick, attacker: EntityId, target: EntityId, projectile: EntityId) -> Self {
        Self::new(
            tick,
            EventPriority::Ability,
            GameEventData::NpcAttack { attacker, target, projectile },
        )
    }

    /// Create damage applied event.
    pub fn damage_applied(tick: SimulationTick, entity: EntityId, amount: i32, remaining: i32) -> Self {
        Self::new(
            tick,
            EventPriority::Damage,
            GameEventData::DamageApplied { entity, amount, remaining },
        )
    }

    /// Create destruction event.
    pub fn destroyed(tick: SimulationTick, entity: EntityId, kind: EntityKind) -> Self {
        Self::new(tick, EventPriority::Destruction, GameEventData::EntityDestroyed { entity, kind })
    }

    /// Create session event.
    pub fn session(tick: SimulationTick, data: GameEventData) -> Self {
        Self::new(tick, EventPriority::Session, data)
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.entity == other.entity
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then entity
        self.tick
            .wrapping_cmp(other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.entity.cmp(&other.entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let tick = SimulationTick::new(10);
        let destroyed = GameEvent::destroyed(tick, EntityId(4), EntityKind::Champion);
        let damage = GameEvent::damage_applied(tick, EntityId(1), 30, 70);
        let other_damage = GameEvent::damage_applied(tick, EntityId(2), 30, 70);
        let game_over = GameEvent::session(tick, GameEventData::GameOver { winner: TeamType::Blue });

        // Session before destruction before damage
        assert!(game_over < destroyed);
        assert!(destroyed < damage);

        // Same priority, lower entity first
        assert!(damage < other_damage);

        // Earlier tick first
        let later = GameEvent::session(tick.add(1), GameEventData::GameStarted);
        assert!(damage < later);
    }

    #[test]
    fn test_lobby_events_sort_first() {
        let joined = GameEvent::session(
            SimulationTick::INVALID,
            GameEventData::PlayerJoined { connection: ConnectionId(1), team: TeamType::Blue, champion: EntityId(3) },
        );
        let countdown = GameEvent::session(
            SimulationTick::new(1),
            GameEventData::CountdownStarted { target_tick: SimulationTick::new(181) },
        );
        let mut events = vec![countdown.clone(), joined.clone()];
        events.sort();
        assert_eq!(events[0].data, joined.data);
        assert_eq!(events[1].data, countdown.data);
    }

    #[test]
    fn test_ordering_across_wraparound() {
        let last = SimulationTick::new(0x7FFF_FFFF);
        let wrapped = last.add(1);
        let before = GameEvent::damage_applied(last, EntityId(1), 10, 90);
        let after = GameEvent::session(wrapped, GameEventData::GameStarted);
        assert_eq!(wrapped.tick_index(), 0);

        let mut events = vec![after.clone(), before.clone()];
        events.sort();
        assert_eq!(events[0].data, before.data);
        assert_eq!(events[1].data, after.data);
    }
}
