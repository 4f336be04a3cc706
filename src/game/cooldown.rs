//! Cooldown Tracker
//!
//! Ability gating over tick histories. A cast records its expiry tick; later
//! passes read the history back instead of keeping a countdown, so replaying
//! a tick produces the same answer.
//!
//! ## Champion abilities
//!
//! Expiries are written by the predicting client only, once per tick, at
//! `current + 1`. The check scans back across the current resimulation batch
//! so an expiry recorded anywhere in the batch is seen by every pass of it.
//!
//! ## NPC attacks
//!
//! Written on every role at the current tick, on first passes.

use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::config::SimConfig;
use crate::core::history::{TickHistory, expect_in_order};
use crate::core::tick::SimulationTick;
use crate::game::clock::{ConnectionId, TickClock};
use crate::game::collision::CollisionResolver;
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::input::InputFrame;
use crate::game::prefab;
use crate::game::state::{AbilityKind, CooldownTargets, EntityBundle, EntityId, SimWorld};

// =============================================================================
// QUERIES
// =============================================================================

/// Latest valid expiry of `ability` visible from the current batch.
///
/// Checks `current`, `current - 1`, ... for `batch_size` ticks and returns
/// the first valid expiry found.
pub fn latest_expiry(
    history: &TickHistory<CooldownTargets>,
    clock: &TickClock,
    ability: AbilityKind,
) -> SimulationTick {
    let current = clock.current_tick();
    for offset in 0..clock.resimulation_batch_size() {
        let test_tick = current.subtract(offset);
        if let Some(targets) = history.lookup(test_tick) {
            let expiry = targets.get(ability);
            if expiry.is_valid() {
                return expiry;
            }
        }
    }
    SimulationTick::INVALID
}

/// Is `ability` on cooldown at the current tick?
pub fn is_on_cooldown(
    history: &TickHistory<CooldownTargets>,
    clock: &TickClock,
    ability: AbilityKind,
) -> bool {
    let expiry = latest_expiry(history, clock, ability);
    expiry.is_valid() && expiry.is_newer_than(clock.current_tick())
}

/// Fraction of the cooldown still remaining, 0.0 when ready.
pub fn remaining_fraction(
    history: &TickHistory<CooldownTargets>,
    current: SimulationTick,
    ability: AbilityKind,
    cooldown_ticks: u32,
) -> f32 {
    let expiry = history
        .lookup(current)
        .map(|targets| targets.get(ability))
        .unwrap_or(SimulationTick::INVALID);
    if !expiry.is_valid() || !expiry.is_newer_than(current) || cooldown_ticks == 0 {
        return 0.0;
    }
    (expiry.ticks_since(current) as f32 / cooldown_ticks as f32).min(1.0)
}

/// Cooldown length of a champion ability.
pub fn cooldown_ticks(config: &SimConfig, ability: AbilityKind) -> u32 {
    match ability {
        AbilityKind::Aoe => config.aoe.cooldown_ticks,
        AbilityKind::SkillShot => config.skill_shot.cooldown_ticks,
    }
}

// =============================================================================
// WRITES
// =============================================================================

/// Record that `ability` fired at the current tick.
///
/// Client first passes only; the server never records champion cooldowns.
pub fn record_cooldown(world: &mut SimWorld, clock: &TickClock, champion: EntityId, ability: AbilityKind, ticks: u32) {
    if clock.is_server() || !clock.is_first_full_prediction() {
        return;
    }
    let Some(history) = world.histories.cooldowns.get_mut(&champion) else {
        return;
    };
    let current = clock.current_tick();
    let write_tick = current.add(1);
    let mut targets = history.lookup_or(write_tick, CooldownTargets::default());
    targets.set(ability, current.add(ticks));
    expect_in_order(history.record(write_tick, targets));
    trace!(%champion, ?ability, %write_tick, expiry = %targets.get(ability), "cooldown recorded");
}

fn spawn_effect(world: &mut SimWorld, clock: &TickClock, bundle: EntityBundle) -> EntityId {
    if clock.is_server() {
        world.spawn(bundle)
    } else {
        world.spawn_predicted(bundle, clock.current_tick())
    }
}

// =============================================================================
// CHAMPION ABILITIES
// =============================================================================

/// Run champion abilities for this tick.
///
/// Casting spawns entities, so it only happens on first passes.
pub fn process_champion_abilities(
    world: &mut SimWorld,
    clock: &TickClock,
    config: &SimConfig,
    inputs: &BTreeMap<ConnectionId, InputFrame>,
) {
    if !clock.is_first_full_prediction() {
        return;
    }

    // Collect first: casting mutates the tables being iterated
    let casters: Vec<(EntityId, ConnectionId, bool)> = world
        .champions
        .iter()
        .filter(|(id, _)| world.is_active(**id))
        .map(|(id, champion)| (*id, champion.owner, champion.aiming))
        .collect();

    for (champion, owner, aiming) in casters {
        let Some(input) = inputs.get(&owner).copied() else {
            continue;
        };
        cast_aoe(world, clock, config, champion, &input);
        if aiming {
            resolve_skill_shot_aim(world, clock, config, champion, &input);
        } else {
            begin_skill_shot_aim(world, clock, champion, &input);
        }
    }
}

fn ability_ready(world: &SimWorld, clock: &TickClock, champion: EntityId, ability: AbilityKind) -> bool {
    world
        .histories
        .cooldowns
        .get(&champion)
        .is_some_and(|history| !is_on_cooldown(history, clock, ability))
}

fn cast_aoe(world: &mut SimWorld, clock: &TickClock, config: &SimConfig, champion: EntityId, input: &InputFrame) {
    if !input.aoe_pressed() || !ability_ready(world, clock, champion, AbilityKind::Aoe) {
        return;
    }
    let team = world.team_of(champion);
    let spawned = spawn_effect(world, clock, prefab::aoe(config, team, input.aim));
    world.push_event(GameEvent::ability_cast(clock.current_tick(), champion, AbilityKind::Aoe, spawned));
    record_cooldown(world, clock, champion, AbilityKind::Aoe, config.aoe.cooldown_ticks);
}

fn begin_skill_shot_aim(world: &mut SimWorld, clock: &TickClock, champion: EntityId, input: &InputFrame) {
    if !input.skill_shot_pressed() || !ability_ready(world, clock, champion, AbilityKind::SkillShot) {
        return;
    }
    if let Some(state) = world.champions.get_mut(&champion) {
        state.aiming = true;
        world.push_event(GameEvent::new(
            clock.current_tick(),
            EventPriority::Ability,
            GameEventData::SkillShotAimStarted { caster: champion },
        ));
    }
}

fn resolve_skill_shot_aim(
    world: &mut SimWorld,
    clock: &TickClock,
    config: &SimConfig,
    champion: EntityId,
    input: &InputFrame,
) {
    if input.cancel_pressed() {
        clear_aim(world, champion);
        world.push_event(GameEvent::new(
            clock.current_tick(),
            EventPriority::Ability,
            GameEventData::SkillShotAimCancelled { caster: champion },
        ));
        return;
    }
    if !input.confirm_pressed() {
        return;
    }

    let team = world.team_of(champion);
    let Some(origin) = world.positions.get(&champion).copied() else {
        return;
    };
    let spawned = spawn_effect(world, clock, prefab::skill_shot(config, team, origin, input.aim));
    clear_aim(world, champion);
    world.push_event(GameEvent::ability_cast(
        clock.current_tick(),
        champion,
        AbilityKind::SkillShot,
        spawned,
    ));
    record_cooldown(world, clock, champion, AbilityKind::SkillShot, config.skill_shot.cooldown_ticks);
}

/// Drop a champion's skill shot aim.
pub fn clear_aim(world: &mut SimWorld, champion: EntityId) {
    if let Some(state) = world.champions.get_mut(&champion) {
        state.aiming = false;
    }
}

// =============================================================================
// NPC ATTACKS
// =============================================================================

/// Refresh every NPC's target: nearest active enemy with hit points in range.
pub fn acquire_npc_targets(world: &mut SimWorld, resolver: &dyn CollisionResolver) {
    let attackers: Vec<EntityId> = world.npc_attackers.keys().copied().collect();
    for attacker in attackers {
        let target = {
            let world_ref: &SimWorld = world;
            let team = world_ref.team_of(attacker);
            let (Some(center), Some(npc)) = (
                world_ref.positions.get(&attacker).copied(),
                world_ref.npc_attackers.get(&attacker),
            ) else {
                continue;
            };
            let enemy = |id: EntityId| {
                let other = world_ref.team_of(id);
                other.is_playing_team() && other != team && world_ref.hit_points.contains_key(&id)
            };
            resolver
                .nearest(world_ref, center, npc.target_radius, &enemy)
                .map(|hit| hit.entity)
        };
        if let Some(npc) = world.npc_attackers.get_mut(&attacker) {
            npc.target = target;
        }
    }
}

/// Fire at the current target when the attack timer allows it.
pub fn process_npc_attacks(world: &mut SimWorld, clock: &TickClock, config: &SimConfig) {
    if !clock.is_first_full_prediction() || !world.session.is_playing() {
        return;
    }
    let current = clock.current_tick();

    let ready: Vec<(EntityId, EntityId, u32)> = world
        .npc_attackers
        .iter()
        .filter(|(id, _)| world.is_active(**id))
        .filter_map(|(id, npc)| {
            let target = npc.target.filter(|target| world.is_active(*target))?;
            let expiry = world
                .histories
                .npc_attacks
                .get(id)
                .and_then(|history| history.lookup(current).copied())
                .unwrap_or(SimulationTick::INVALID);
            let can_attack = !expiry.is_valid() || current.is_newer_than(expiry);
            can_attack.then_some((*id, target, npc.cooldown_ticks))
        })
        .collect();

    for (attacker, target, cooldown) in ready {
        let (Some(from), Some(toward)) = (
            world.positions.get(&attacker).copied(),
            world.positions.get(&target).copied(),
        ) else {
            continue;
        };
        let team = world.team_of(attacker);
        let projectile = spawn_effect(world, clock, prefab::npc_projectile(config, team, from, toward));
        if let Some(history) = world.histories.npc_attacks.get_mut(&attacker) {
            expect_in_order(history.record(current, current.add(cooldown)));
        }
        world.push_event(GameEvent::npc_attack(current, attacker, target, projectile));
        debug!(%attacker, %target, %projectile, "npc attack");
    }
}
