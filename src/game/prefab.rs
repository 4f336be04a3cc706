//! Entity Templates
//!
//! Builds [`EntityBundle`]s from the resolved configuration.

use crate::config::SimConfig;
use crate::core::vec2::FixedVec2;
use crate::game::clock::ConnectionId;
use crate::game::state::{
    Champion, EntityBundle, EntityKind, Lane, Minion, NpcAttacker, Projectile, SimWorld, TeamType,
};

/// Spawn point for a team.
pub fn spawn_position(config: &SimConfig, team: TeamType) -> FixedVec2 {
    match team {
        TeamType::Red => config.champion.red_spawn,
        _ => config.champion.blue_spawn,
    }
}

/// Champion owned by `owner`.
pub fn champion(config: &SimConfig, team: TeamType, owner: ConnectionId, position: FixedVec2) -> EntityBundle {
    EntityBundle::new(EntityKind::Champion, team, position)
        .with_collider(config.champion.radius)
        .with_hit_points(config.champion.max_hit_points)
        .with_champion(Champion {
            owner,
            move_target: position,
            move_speed: config.champion.move_speed,
            aiming: false,
        })
}

/// AOE instance centred on `at`.
pub fn aoe(config: &SimConfig, team: TeamType, at: FixedVec2) -> EntityBundle {
    EntityBundle::new(EntityKind::AoeAbility, team, at)
        .with_collider(config.aoe.radius)
        .with_damage_on_trigger(config.aoe.damage)
        .with_lifetime_ms(config.aoe.lifetime_ms)
}

/// Skill shot leaving `from` toward `toward`.
pub fn skill_shot(config: &SimConfig, team: TeamType, from: FixedVec2, toward: FixedVec2) -> EntityBundle {
    EntityBundle::new(EntityKind::SkillShot, team, from)
        .with_collider(config.skill_shot.radius)
        .with_damage_on_trigger(config.skill_shot.damage)
        .with_lifetime_ms(config.skill_shot.lifetime_ms)
        .with_projectile(Projectile {
            heading: toward.sub(from).normalize(),
            speed: config.skill_shot.speed,
        })
}

/// NPC projectile leaving `from` toward `toward`.
pub fn npc_projectile(config: &SimConfig, team: TeamType, from: FixedVec2, toward: FixedVec2) -> EntityBundle {
    EntityBundle::new(EntityKind::NpcProjectile, team, from)
        .with_collider(config.npc.projectile_radius)
        .with_damage_on_trigger(config.npc.projectile_damage)
        .with_lifetime_ms(config.npc.projectile_lifetime_ms)
        .with_projectile(Projectile {
            heading: toward.sub(from).normalize(),
            speed: config.npc.projectile_speed,
        })
}

/// Team base: attacks nearby enemies and ends the game when destroyed.
pub fn base(config: &SimConfig, team: TeamType) -> EntityBundle {
    let position = match team {
        TeamType::Red => config.npc.red_base,
        _ => config.npc.blue_base,
    };
    EntityBundle::new(EntityKind::Base, team, position)
        .with_collider(config.npc.base_radius)
        .with_hit_points(config.npc.base_hit_points)
        .with_npc_attacker(NpcAttacker {
            target_radius: config.npc.target_radius,
            cooldown_ticks: config.npc.attack_cooldown_ticks,
            target: None,
        })
        .ending_game_on_destroy()
}

/// Lane minion at the team's end of `lane`, or `None` for an empty lane.
pub fn minion(config: &SimConfig, team: TeamType, lane: Lane) -> Option<EntityBundle> {
    let path = config.minion.lane(lane);
    let reversed = team == TeamType::Red;
    let start = if reversed { path.last() } else { path.first() };
    let position = *start?;
    Some(
        EntityBundle::new(EntityKind::Minion, team, position)
            .with_collider(config.minion.radius)
            .with_hit_points(config.minion.max_hit_points)
            .with_npc_attacker(NpcAttacker {
                target_radius: config.minion.target_radius,
                cooldown_ticks: config.minion.attack_cooldown_ticks,
                target: None,
            })
            .with_minion(Minion {
                lane,
                reversed,
                path_index: 0,
                move_speed: config.minion.move_speed,
            }),
    )
}

/// Server: populate a fresh world with both team bases.
pub fn setup_arena(world: &mut SimWorld, config: &SimConfig) {
    for team in [TeamType::Blue, TeamType::Red] {
        world.spawn(base(config, team));
    }
}
