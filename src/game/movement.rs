//! Movement
//!
//! Champions walk toward their clicked destination; projectiles fly straight.
//! Pure functions of state and inputs, so they run on every pass.

use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::game::clock::ConnectionId;
use crate::game::input::InputFrame;
use crate::game::state::SimWorld;

/// Take new walk destinations from this tick's inputs.
pub fn apply_move_inputs(world: &mut SimWorld, inputs: &BTreeMap<ConnectionId, InputFrame>) {
    for (id, champion) in world.champions.iter_mut() {
        if world.destroy_tags.contains(id) {
            continue;
        }
        if let Some(target) = inputs.get(&champion.owner).and_then(|input| input.move_target) {
            champion.move_target = target;
        }
    }
}

/// Step every champion toward its destination.
pub fn move_champions(world: &mut SimWorld, config: &SimConfig) {
    for (id, champion) in &world.champions {
        if world.destroy_tags.contains(id) {
            continue;
        }
        if let Some(position) = world.positions.get_mut(id) {
            *position = position.move_towards(champion.move_target, config.per_tick(champion.move_speed));
        }
    }
}

/// Advance every projectile along its heading.
pub fn move_projectiles(world: &mut SimWorld, config: &SimConfig) {
    for (id, projectile) in &world.projectiles {
        if world.destroy_tags.contains(id) {
            continue;
        }
        if let Some(position) = world.positions.get_mut(id) {
            let step = projectile.heading.scale(config.per_tick(projectile.speed));
            *position = position.add(step);
        }
    }
}
