//! Simulation World State
//!
//! Entities are plain ids; their data lives in per-component side tables.
//! Every table is a BTreeMap keyed by [`EntityId`] so iteration order is the
//! same on the server, every client and every resimulation pass.
//!
//! ```text
//! ┌─────────────────────── SimWorld ────────────────────────┐
//! │ replicated tables   kinds teams positions hit_points …  │
//! │ histories           cooldowns npc_attacks damage        │
//! │ singletons          session respawns                    │
//! │ per-pass scratch    committed_this_pass pending_events  │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::config::SimConfig;
use crate::core::fixed::Fixed;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::history::TickHistory;
use crate::core::tick::SimulationTick;
use crate::core::vec2::FixedVec2;
use crate::game::clock::ConnectionId;
use crate::game::events::GameEvent;
use crate::game::lifecycle::RespawnQueue;
use crate::game::minion::WaveSpawner;
use crate::game::session::Session;

// =============================================================================
// ENTITY ID
// =============================================================================

/// Entity handle.
///
/// Server-spawned entities count up from 1. Entities a client spawns while
/// predicting use a separate range starting at [`EntityId::PREDICTED_BASE`]
/// so they never collide with ids the server hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// First id of the client prediction range.
    pub const PREDICTED_BASE: u32 = 1 << 31;

    /// Was this entity spawned by client prediction?
    #[inline]
    pub fn is_predicted(self) -> bool {
        self.0 >= Self::PREDICTED_BASE
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_predicted() {
            write!(f, "e{}p", self.0 - Self::PREDICTED_BASE)
        } else {
            write!(f, "e{}", self.0)
        }
    }
}

// =============================================================================
// TEAM
// =============================================================================

/// Team membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TeamType {
    /// Unaffiliated
    #[default]
    None = 0,
    /// Blue team
    Blue = 1,
    /// Red team
    Red = 2,
    /// Let the server pick (requests only)
    AutoAssign = 255,
}

impl TeamType {
    /// The other side of a match. `None` and `AutoAssign` have no opponent.
    pub fn opposing(self) -> TeamType {
        match self {
            TeamType::Blue => TeamType::Red,
            TeamType::Red => TeamType::Blue,
            other => other,
        }
    }

    /// Is this one of the two playing teams?
    #[inline]
    pub fn is_playing_team(self) -> bool {
        matches!(self, TeamType::Blue | TeamType::Red)
    }
}

// =============================================================================
// COMPONENTS
// =============================================================================

/// What an entity is, for logging and hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    /// Player-controlled champion
    Champion = 0,
    /// Base structure; its loss ends the game
    Base = 1,
    /// Area-of-effect ability instance
    AoeAbility = 2,
    /// Skill shot projectile
    SkillShot = 3,
    /// Projectile fired by an NPC
    NpcProjectile = 4,
    /// Lane minion
    Minion = 5,
}

/// Hit points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    /// Current value; may drop below zero.
    pub current: i32,
    /// Maximum value.
    pub max: i32,
}

impl HitPoints {
    /// Full health.
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Has this entity run out of hit points?
    #[inline]
    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

/// Deals a fixed amount of damage once to each entity it touches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageOnTrigger {
    /// Damage per receiver.
    pub amount: i32,
    /// Receivers already hit.
    pub already_damaged: BTreeSet<EntityId>,
}

impl DamageOnTrigger {
    /// New trigger that has hit nobody yet.
    pub fn new(amount: i32) -> Self {
        Self {
            amount,
            already_damaged: BTreeSet::new(),
        }
    }
}

/// Player-controlled champion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Champion {
    /// Owning connection.
    pub owner: ConnectionId,
    /// Where the champion is walking to.
    pub move_target: FixedVec2,
    /// Units per second.
    pub move_speed: Fixed,
    /// Skill shot is being aimed.
    pub aiming: bool,
}

/// Straight-line projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unit heading.
    pub heading: FixedVec2,
    /// Units per second.
    pub speed: Fixed,
}

/// Automated attacker (bases).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcAttacker {
    /// Acquisition radius.
    pub target_radius: Fixed,
    /// Ticks between attacks.
    pub cooldown_ticks: u32,
    /// Current target, refreshed every tick.
    pub target: Option<EntityId>,
}

/// Lane a minion walks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Lane {
    /// Top lane
    Top = 0,
    /// Middle lane
    Mid = 1,
    /// Bottom lane
    Bot = 2,
}

impl Lane {
    /// Every lane, in spawn order.
    pub const ALL: [Lane; 3] = [Lane::Top, Lane::Mid, Lane::Bot];
}

/// Lane walker. Blue walks its lane forward, red walks it reversed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minion {
    /// Lane
    pub lane: Lane,
    /// Walks the lane from its last waypoint
    pub reversed: bool,
    /// Waypoints reached so far, counted from the walker's start
    pub path_index: u32,
    /// Units per second
    pub move_speed: Fixed,
}

/// The two cooldown-gated champion abilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Area of effect
    Aoe,
    /// Aimed skill shot
    SkillShot,
}

/// Expiry ticks of every champion ability, recorded together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CooldownTargets {
    /// AOE expiry.
    pub aoe: SimulationTick,
    /// Skill shot expiry.
    pub skill_shot: SimulationTick,
}

impl CooldownTargets {
    /// Expiry of one ability.
    pub fn get(&self, ability: AbilityKind) -> SimulationTick {
        match ability {
            AbilityKind::Aoe => self.aoe,
            AbilityKind::SkillShot => self.skill_shot,
        }
    }

    /// Set the expiry of one ability.
    pub fn set(&mut self, ability: AbilityKind, expiry: SimulationTick) {
        match ability {
            AbilityKind::Aoe => self.aoe = expiry,
            AbilityKind::SkillShot => self.skill_shot = expiry,
        }
    }
}

/// Damage committed for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageSnapshot {
    /// Tick the damage belongs to.
    pub tick: SimulationTick,
    /// Total damage.
    pub amount: i32,
}

/// Histories kept per entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTables {
    /// Champion ability expiries. Written on client first passes only.
    pub cooldowns: BTreeMap<EntityId, TickHistory<CooldownTargets>>,
    /// NPC attack expiries.
    pub npc_attacks: BTreeMap<EntityId, TickHistory<SimulationTick>>,
    /// Committed damage. Rewritten on every pass.
    pub damage: BTreeMap<EntityId, TickHistory<DamageSnapshot>>,
}

// =============================================================================
// ENTITY BUNDLE
// =============================================================================

/// Component set for spawning one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityBundle {
    /// Kind
    pub kind: EntityKind,
    /// Team
    pub team: TeamType,
    /// Position
    pub position: FixedVec2,
    /// Collision radius
    pub collider_radius: Option<Fixed>,
    /// Hit points; also makes the entity a damage receiver
    pub hit_points: Option<HitPoints>,
    /// Damage dealt on contact
    pub damage_on_trigger: Option<i32>,
    /// Lifetime, converted to a destroy tick on the first step
    pub lifetime_ms: Option<u32>,
    /// Champion data
    pub champion: Option<Champion>,
    /// Projectile data
    pub projectile: Option<Projectile>,
    /// NPC attack data
    pub npc_attacker: Option<NpcAttacker>,
    /// Lane walker data
    pub minion: Option<Minion>,
    /// Destroying this entity ends the game
    pub game_over_on_destroy: bool,
}

impl EntityBundle {
    /// Bare entity.
    pub fn new(kind: EntityKind, team: TeamType, position: FixedVec2) -> Self {
        Self {
            kind,
            team,
            position,
            collider_radius: None,
            hit_points: None,
            damage_on_trigger: None,
            lifetime_ms: None,
            champion: None,
            projectile: None,
            npc_attacker: None,
            minion: None,
            game_over_on_destroy: false,
        }
    }

    /// Add a circle collider.
    pub fn with_collider(mut self, radius: Fixed) -> Self {
        self.collider_radius = Some(radius);
        self
    }

    /// Add hit points at full health.
    pub fn with_hit_points(mut self, max: i32) -> Self {
        self.hit_points = Some(HitPoints::full(max));
        self
    }

    /// Deal `amount` to each entity touched.
    pub fn with_damage_on_trigger(mut self, amount: i32) -> Self {
        self.damage_on_trigger = Some(amount);
        self
    }

    /// Destroy after `millis`.
    pub fn with_lifetime_ms(mut self, millis: u32) -> Self {
        self.lifetime_ms = Some(millis);
        self
    }

    /// Attach champion data.
    pub fn with_champion(mut self, champion: Champion) -> Self {
        self.champion = Some(champion);
        self
    }

    /// Attach projectile motion.
    pub fn with_projectile(mut self, projectile: Projectile) -> Self {
        self.projectile = Some(projectile);
        self
    }

    /// Attach NPC attack data.
    pub fn with_npc_attacker(mut self, attacker: NpcAttacker) -> Self {
        self.npc_attacker = Some(attacker);
        self
    }

    /// Attach lane walker data.
    pub fn with_minion(mut self, minion: Minion) -> Self {
        self.minion = Some(minion);
        self
    }

    /// Destroying this entity ends the game.
    pub fn ending_game_on_destroy(mut self) -> Self {
        self.game_over_on_destroy = true;
        self
    }
}

// =============================================================================
// SIM WORLD
// =============================================================================

/// Complete simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimWorld {
    /// Next server entity id
    pub next_entity: u32,
    /// Next client-predicted entity id
    pub next_predicted: u32,
    /// Window for newly created histories
    pub history_window: u32,

    /// Entity kinds; an entity exists while it has a kind
    pub kinds: BTreeMap<EntityId, EntityKind>,
    /// Team membership
    pub teams: BTreeMap<EntityId, TeamType>,
    /// World positions
    pub positions: BTreeMap<EntityId, FixedVec2>,
    /// Circle collider radii
    pub colliders: BTreeMap<EntityId, Fixed>,
    /// Hit points
    pub hit_points: BTreeMap<EntityId, HitPoints>,
    /// Raw damage received this tick, in contact order
    pub damage_buffers: BTreeMap<EntityId, Vec<i32>>,
    /// Contact damage dealers
    pub damage_on_trigger: BTreeMap<EntityId, DamageOnTrigger>,
    /// Lifetimes not yet converted to destroy ticks
    pub destroy_timers: BTreeMap<EntityId, u32>,
    /// Destroy deadlines
    pub destroy_at: BTreeMap<EntityId, SimulationTick>,
    /// Entities marked for destruction
    pub destroy_tags: BTreeSet<EntityId>,
    /// Entities whose destruction ends the game
    pub game_over_on_destroy: BTreeSet<EntityId>,
    /// Champions
    pub champions: BTreeMap<EntityId, Champion>,
    /// Projectiles
    pub projectiles: BTreeMap<EntityId, Projectile>,
    /// NPC attackers
    pub npc_attackers: BTreeMap<EntityId, NpcAttacker>,
    /// Lane minions
    pub minions: BTreeMap<EntityId, Minion>,
    /// Client-predicted spawns and the tick they were spawned at
    pub predicted_spawns: BTreeMap<EntityId, SimulationTick>,

    /// Tick histories
    pub histories: HistoryTables,

    /// Session state machine
    pub session: Session,
    /// Pending champion respawns
    pub respawns: RespawnQueue,
    /// Minion wave schedule
    pub waves: WaveSpawner,

    /// Receivers that committed damage during the current pass
    #[serde(skip)]
    pub committed_this_pass: BTreeSet<EntityId>,
    /// Events generated this pass
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl SimWorld {
    /// Empty world for `config`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            next_entity: 1,
            next_predicted: EntityId::PREDICTED_BASE,
            history_window: config.history_window_ticks,
            kinds: BTreeMap::new(),
            teams: BTreeMap::new(),
            positions: BTreeMap::new(),
            colliders: BTreeMap::new(),
            hit_points: BTreeMap::new(),
            damage_buffers: BTreeMap::new(),
            damage_on_trigger: BTreeMap::new(),
            destroy_timers: BTreeMap::new(),
            destroy_at: BTreeMap::new(),
            destroy_tags: BTreeSet::new(),
            game_over_on_destroy: BTreeSet::new(),
            champions: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            npc_attackers: BTreeMap::new(),
            minions: BTreeMap::new(),
            predicted_spawns: BTreeMap::new(),
            histories: HistoryTables::default(),
            session: Session::default(),
            respawns: RespawnQueue::default(),
            waves: WaveSpawner::default(),
            committed_this_pass: BTreeSet::new(),
            pending_events: Vec::new(),
        }
    }

    /// Spawn an authoritative entity.
    pub fn spawn(&mut self, bundle: EntityBundle) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.insert_bundle(id, bundle);
        id
    }

    /// Spawn an entity from client prediction at `tick`.
    pub fn spawn_predicted(&mut self, bundle: EntityBundle, tick: SimulationTick) -> EntityId {
        let id = EntityId(self.next_predicted);
        self.next_predicted = self.next_predicted.wrapping_add(1).max(EntityId::PREDICTED_BASE);
        self.insert_bundle(id, bundle);
        self.predicted_spawns.insert(id, tick);
        id
    }

    fn insert_bundle(&mut self, id: EntityId, bundle: EntityBundle) {
        let window = self.history_window;
        self.kinds.insert(id, bundle.kind);
        self.teams.insert(id, bundle.team);
        self.positions.insert(id, bundle.position);
        if let Some(radius) = bundle.collider_radius {
            self.colliders.insert(id, radius);
        }
        if let Some(hp) = bundle.hit_points {
            self.hit_points.insert(id, hp);
            self.damage_buffers.insert(id, Vec::new());
            self.histories.damage.insert(id, TickHistory::new(window));
        }
        if let Some(amount) = bundle.damage_on_trigger {
            self.damage_on_trigger.insert(id, DamageOnTrigger::new(amount));
        }
        if let Some(millis) = bundle.lifetime_ms {
            self.destroy_timers.insert(id, millis);
        }
        if let Some(champion) = bundle.champion {
            self.champions.insert(id, champion);
            self.histories.cooldowns.insert(id, TickHistory::new(window));
        }
        if let Some(projectile) = bundle.projectile {
            self.projectiles.insert(id, projectile);
        }
        if let Some(attacker) = bundle.npc_attacker {
            self.npc_attackers.insert(id, attacker);
            self.histories.npc_attacks.insert(id, TickHistory::new(window));
        }
        if let Some(minion) = bundle.minion {
            self.minions.insert(id, minion);
        }
        if bundle.game_over_on_destroy {
            self.game_over_on_destroy.insert(id);
        }
    }

    /// Remove an entity and every row it owns.
    pub fn despawn(&mut self, id: EntityId) {
        self.kinds.remove(&id);
        self.teams.remove(&id);
        self.positions.remove(&id);
        self.colliders.remove(&id);
        self.hit_points.remove(&id);
        self.damage_buffers.remove(&id);
        self.damage_on_trigger.remove(&id);
        self.destroy_timers.remove(&id);
        self.destroy_at.remove(&id);
        self.destroy_tags.remove(&id);
        self.game_over_on_destroy.remove(&id);
        self.champions.remove(&id);
        self.projectiles.remove(&id);
        self.npc_attackers.remove(&id);
        self.minions.remove(&id);
        self.predicted_spawns.remove(&id);
        self.histories.cooldowns.remove(&id);
        self.histories.npc_attacks.remove(&id);
        self.histories.damage.remove(&id);
        self.committed_this_pass.remove(&id);
    }

    /// Copy every row of `id` from another world.
    fn transplant(&mut self, from: &SimWorld, id: EntityId) {
        fn copy_row<V: Clone>(to: &mut BTreeMap<EntityId, V>, from: &BTreeMap<EntityId, V>, id: EntityId) {
            if let Some(value) = from.get(&id) {
                to.insert(id, value.clone());
            }
        }
        fn copy_flag(to: &mut BTreeSet<EntityId>, from: &BTreeSet<EntityId>, id: EntityId) {
            if from.contains(&id) {
                to.insert(id);
            }
        }

        copy_row(&mut self.kinds, &from.kinds, id);
        copy_row(&mut self.teams, &from.teams, id);
        copy_row(&mut self.positions, &from.positions, id);
        copy_row(&mut self.colliders, &from.colliders, id);
        copy_row(&mut self.hit_points, &from.hit_points, id);
        copy_row(&mut self.damage_buffers, &from.damage_buffers, id);
        copy_row(&mut self.damage_on_trigger, &from.damage_on_trigger, id);
        copy_row(&mut self.destroy_timers, &from.destroy_timers, id);
        copy_row(&mut self.destroy_at, &from.destroy_at, id);
        copy_flag(&mut self.destroy_tags, &from.destroy_tags, id);
        copy_flag(&mut self.game_over_on_destroy, &from.game_over_on_destroy, id);
        copy_row(&mut self.champions, &from.champions, id);
        copy_row(&mut self.projectiles, &from.projectiles, id);
        copy_row(&mut self.npc_attackers, &from.npc_attackers, id);
        copy_row(&mut self.minions, &from.minions, id);
        copy_row(&mut self.predicted_spawns, &from.predicted_spawns, id);
        copy_row(&mut self.histories.cooldowns, &from.histories.cooldowns, id);
        copy_row(&mut self.histories.npc_attacks, &from.histories.npc_attacks, id);
        copy_row(&mut self.histories.damage, &from.histories.damage, id);
    }

    /// Roll back to a confirmed world taken at `confirmed_tick`.
    ///
    /// Replicated tables come from `confirmed`. Histories written only on
    /// first passes (champion cooldowns, NPC attack timers) are local and
    /// survive; damage history is taken from `confirmed` so the replay can
    /// record the same ticks again. Predicted spawns newer than the confirmed
    /// tick are carried over and the prediction id counter never rewinds.
    pub fn restore_from(&mut self, confirmed: &SimWorld, confirmed_tick: SimulationTick) {
        let mut restored = confirmed.clone();

        for (id, history) in std::mem::take(&mut self.histories.cooldowns) {
            if restored.kinds.contains_key(&id) {
                restored.histories.cooldowns.insert(id, history);
            }
        }
        for (id, history) in std::mem::take(&mut self.histories.npc_attacks) {
            if restored.kinds.contains_key(&id) {
                restored.histories.npc_attacks.insert(id, history);
            }
        }

        let carried: Vec<EntityId> = self
            .predicted_spawns
            .iter()
            .filter(|(id, spawned)| {
                spawned.is_newer_than(confirmed_tick) && !restored.kinds.contains_key(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in carried {
            restored.transplant(self, id);
            if let Some(trigger) = restored.damage_on_trigger.get_mut(&id) {
                trigger.already_damaged.clear();
            }
            if let Some(history) = restored.histories.damage.get_mut(&id) {
                history.truncate_after(confirmed_tick);
            }
        }

        restored.next_entity = restored.next_entity.max(self.next_entity);
        restored.next_predicted = self.next_predicted;
        restored.committed_this_pass.clear();
        restored.pending_events = std::mem::take(&mut self.pending_events);
        *self = restored;
    }

    /// Does the entity exist?
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.kinds.contains_key(&id)
    }

    /// Exists and is not marked for destruction.
    #[inline]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.contains(id) && !self.destroy_tags.contains(&id)
    }

    /// Team of an entity (`None` when unknown).
    #[inline]
    pub fn team_of(&self, id: EntityId) -> TeamType {
        self.teams.get(&id).copied().unwrap_or_default()
    }

    /// Champion owned by `connection`.
    pub fn champion_of(&self, connection: ConnectionId) -> Option<EntityId> {
        self.champions
            .iter()
            .find(|(_, champion)| champion.owner == connection)
            .map(|(id, _)| *id)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.kinds.len()
    }

    /// Clear per-pass scratch state.
    pub fn begin_pass(&mut self) {
        self.committed_this_pass.clear();
    }

    /// Compute hash of replicated state for cross-role verification.
    ///
    /// Client-predicted entities and histories are excluded; only state the
    /// server would also hold participates.
    pub fn compute_hash(&self, tick: SimulationTick) -> StateHash {
        compute_state_hash(tick, |hasher| {
            hasher.update_u32(self.next_entity);
            for (id, kind) in self.kinds.iter().filter(|(id, _)| !id.is_predicted()) {
                hasher.update_u32(id.0);
                hasher.update_u8(*kind as u8);
                hasher.update_u8(self.team_of(*id) as u8);
                if let Some(position) = self.positions.get(id) {
                    hasher.update_vec2(*position);
                }
                if let Some(hp) = self.hit_points.get(id) {
                    hasher.update_i32(hp.current);
                    hasher.update_i32(hp.max);
                }
                if let Some(trigger) = self.damage_on_trigger.get(id) {
                    hasher.update_i32(trigger.amount);
                    for hit in &trigger.already_damaged {
                        hasher.update_u32(hit.0);
                    }
                }
                if let Some(deadline) = self.destroy_at.get(id) {
                    hasher.update_tick(*deadline);
                }
                hasher.update_bool(self.destroy_tags.contains(id));
                if let Some(champion) = self.champions.get(id) {
                    hash_champion(hasher, champion);
                }
                if let Some(attacker) = self.npc_attackers.get(id) {
                    hasher.update_u32(attacker.target.map_or(0, |target| target.0));
                }
                if let Some(minion) = self.minions.get(id) {
                    hasher.update_u8(minion.lane as u8);
                    hasher.update_bool(minion.reversed);
                    hasher.update_u32(minion.path_index);
                }
            }
            self.session.hash_into(hasher);
            self.respawns.hash_into(hasher);
            self.waves.hash_into(hasher);
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

fn hash_champion(hasher: &mut StateHasher, champion: &Champion) {
    hasher.update_u32(champion.owner.0);
    hasher.update_vec2(champion.move_target);
    hasher.update_bool(champion.aiming);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn t(index: u32) -> SimulationTick {
        SimulationTick::new(index)
    }

    fn receiver(team: TeamType) -> EntityBundle {
        EntityBundle::new(EntityKind::Base, team, FixedVec2::ZERO).with_hit_points(100)
    }

    #[test]
    fn test_team_opposing() {
        assert_eq!(TeamType::Blue.opposing(), TeamType::Red);
        assert_eq!(TeamType::Red.opposing(), TeamType::Blue);
        assert_eq!(TeamType::None.opposing(), TeamType::None);
        assert!(!TeamType::AutoAssign.is_playing_team());
    }

    #[test]
    fn test_spawn_creates_rows() {
        let mut world = SimWorld::new(&SimConfig::default());
        let id = world.spawn(receiver(TeamType::Blue));

        assert_eq!(id, EntityId(1));
        assert!(world.contains(id));
        assert_eq!(world.hit_points[&id], HitPoints::full(100));
        assert!(world.damage_buffers[&id].is_empty());
        assert!(world.histories.damage.contains_key(&id));
        assert!(!world.histories.cooldowns.contains_key(&id));
    }

    #[test]
    fn test_despawn_removes_everything() {
        let mut world = SimWorld::new(&SimConfig::default());
        let id = world.spawn(receiver(TeamType::Red).with_lifetime_ms(100));
        world.destroy_tags.insert(id);
        world.despawn(id);

        assert!(!world.contains(id));
        assert!(world.hit_points.is_empty());
        assert!(world.destroy_timers.is_empty());
        assert!(world.destroy_tags.is_empty());
        assert!(world.histories.damage.is_empty());
    }

    #[test]
    fn test_predicted_ids_do_not_collide() {
        let mut world = SimWorld::new(&SimConfig::default());
        let server = world.spawn(receiver(TeamType::Blue));
        let predicted = world.spawn_predicted(receiver(TeamType::Blue), t(10));

        assert!(!server.is_predicted());
        assert!(predicted.is_predicted());
        assert_eq!(world.predicted_spawns[&predicted], t(10));
        assert_eq!(format!("{predicted}"), "e0p");
    }

    #[test]
    fn test_restore_keeps_local_cooldowns_and_new_predictions() {
        let config = SimConfig::default();
        let mut confirmed = SimWorld::new(&config);
        let champion = confirmed.spawn(
            EntityBundle::new(EntityKind::Champion, TeamType::Blue, FixedVec2::ZERO).with_champion(Champion {
                owner: ConnectionId(1),
                move_target: FixedVec2::ZERO,
                move_speed: 0,
                aiming: false,
            }),
        );

        let mut local = confirmed.clone();
        local
            .histories
            .cooldowns
            .get_mut(&champion)
            .unwrap()
            .record(t(101), CooldownTargets { aoe: t(200), ..Default::default() })
            .unwrap();
        let old = local.spawn_predicted(receiver(TeamType::Blue), t(99));
        let fresh = local.spawn_predicted(receiver(TeamType::Blue), t(105));
        local.positions.insert(champion, FixedVec2::from_ints(9, 9));

        local.restore_from(&confirmed, t(100));

        assert_eq!(local.positions[&champion], FixedVec2::ZERO);
        assert_eq!(
            local.histories.cooldowns[&champion].lookup(t(150)).map(|c| c.aoe),
            Some(t(200))
        );
        assert!(!local.contains(old));
        assert!(local.contains(fresh));
        assert_eq!(local.next_predicted, EntityId::PREDICTED_BASE + 2);
    }

    #[test]
    fn test_restore_resets_carried_predictions_for_replay() {
        let config = SimConfig::default();
        let confirmed = SimWorld::new(&config);
        let mut local = confirmed.clone();
        let target = local.spawn(receiver(TeamType::Blue));
        let predicted = local.spawn_predicted(
            EntityBundle::new(EntityKind::AoeAbility, TeamType::Red, FixedVec2::ZERO)
                .with_damage_on_trigger(30)
                .with_hit_points(10),
            t(101),
        );
        local.damage_on_trigger.get_mut(&predicted).unwrap().already_damaged.insert(target);
        let history = local.histories.damage.get_mut(&predicted).unwrap();
        history.record(t(100), DamageSnapshot { tick: t(100), amount: 0 }).unwrap();
        history.record(t(102), DamageSnapshot { tick: t(102), amount: 0 }).unwrap();

        local.restore_from(&confirmed, t(100));

        assert!(local.damage_on_trigger[&predicted].already_damaged.is_empty());
        assert_eq!(local.histories.damage[&predicted].latest().map(|(tick, _)| tick), Some(t(100)));
        assert!(local
            .histories
            .damage
            .get_mut(&predicted)
            .unwrap()
            .record(t(101), DamageSnapshot { tick: t(101), amount: 0 })
            .is_ok());
    }

    #[test]
    fn test_world_hash_determinism() {
        let config = SimConfig::default();
        let mut a = SimWorld::new(&config);
        let mut b = SimWorld::new(&config);
        for team in [TeamType::Blue, TeamType::Red] {
            a.spawn(receiver(team));
            b.spawn(receiver(team));
        }
        assert_eq!(a.compute_hash(t(5)), b.compute_hash(t(5)));

        b.hit_points.values_mut().for_each(|hp| hp.current -= 1);
        assert_ne!(a.compute_hash(t(5)), b.compute_hash(t(5)));
    }

    #[test]
    fn test_predicted_entities_excluded_from_hash() {
        let config = SimConfig::default();
        let mut a = SimWorld::new(&config);
        a.spawn(receiver(TeamType::Blue));
        let b = a.clone();
        a.spawn_predicted(receiver(TeamType::Red), t(3));
        assert_eq!(a.compute_hash(t(5)), b.compute_hash(t(5)));
    }
}
