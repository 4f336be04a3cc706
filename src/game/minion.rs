//! Minion Waves
//!
//! The server spawns a wave on every lane once the wave timer is reached,
//! one minion per team and lane every `spawn_interval_ticks` until the wave
//! is complete. Every role walks minions along their lane waypoints; a
//! minion that reaches its last waypoint holds there.
//!
//! Minions carry hit points and an NPC attacker, so targeting, damage and
//! destruction go through the same systems as bases. They never respawn.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::core::fixed::fixed_mul;
use crate::core::hash::StateHasher;
use crate::core::tick::SimulationTick;
use crate::core::vec2::FixedVec2;
use crate::game::clock::TickClock;
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::prefab;
use crate::game::state::{Lane, Minion, SimWorld, TeamType};

/// Replicated wave schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSpawner {
    /// Tick of the next spawn; INVALID until the game has started
    pub next_spawn: SimulationTick,
    /// Minions already spawned per lane and team in the current wave
    pub spawned_in_wave: u32,
}

impl WaveSpawner {
    /// Hash the schedule.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_tick(self.next_spawn);
        hasher.update_u32(self.spawned_in_wave);
    }
}

/// Server: spawn the due part of the current wave. First passes only.
pub fn spawn_minion_waves(world: &mut SimWorld, clock: &TickClock, config: &SimConfig) {
    let waves = &config.minion;
    if !clock.is_server() || !clock.is_first_full_prediction() || !world.session.is_playing() || waves.count_per_wave == 0 {
        return;
    }
    let current = clock.current_tick();
    let spawner = world.waves;

    if !spawner.next_spawn.is_valid() {
        world.waves.next_spawn = current.add(waves.wave_interval_ticks);
        debug!(next_spawn = %world.waves.next_spawn, "first minion wave scheduled");
        return;
    }
    if !current.has_reached(spawner.next_spawn) {
        return;
    }

    for lane in Lane::ALL {
        for team in [TeamType::Blue, TeamType::Red] {
            let Some(bundle) = prefab::minion(config, team, lane) else {
                continue;
            };
            let minion = world.spawn(bundle);
            world.push_event(GameEvent::new(
                current,
                EventPriority::Other,
                GameEventData::MinionSpawned { minion, lane, team },
            ));
        }
    }

    let spawned = spawner.spawned_in_wave + 1;
    world.waves = if spawned >= waves.count_per_wave {
        info!(%current, "minion wave complete");
        WaveSpawner {
            next_spawn: current.add(waves.wave_interval_ticks),
            spawned_in_wave: 0,
        }
    } else {
        WaveSpawner {
            next_spawn: current.add(waves.spawn_interval_ticks),
            spawned_in_wave: spawned,
        }
    };
}

/// Walk every minion toward its next waypoint while the game is playing.
pub fn move_minions(world: &mut SimWorld, config: &SimConfig) {
    if !world.session.is_playing() {
        return;
    }
    let reach = fixed_mul(config.minion.waypoint_radius, config.minion.waypoint_radius);

    for (id, minion) in world.minions.iter_mut() {
        if world.destroy_tags.contains(id) {
            continue;
        }
        let Some(position) = world.positions.get_mut(id) else {
            continue;
        };
        let path = config.minion.lane(minion.lane);
        let Some(mut target) = waypoint(path, minion) else {
            continue;
        };
        if position.distance_squared(target) <= reach {
            if minion.path_index as usize + 1 >= path.len() {
                continue;
            }
            minion.path_index += 1;
            let Some(next) = waypoint(path, minion) else {
                continue;
            };
            target = next;
        }
        *position = position.move_towards(target, config.per_tick(minion.move_speed));
    }
}

fn waypoint(path: &[FixedVec2], minion: &Minion) -> Option<FixedVec2> {
    let index = minion.path_index as usize;
    let index = if minion.reversed {
        path.len().checked_sub(index + 1)?
    } else {
        index
    };
    path.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::from_int;
    use crate::game::clock::{ConnectionId, Role};
    use crate::game::session::SessionState;
    use crate::game::state::EntityKind;

    fn t(index: u32) -> SimulationTick {
        SimulationTick::new(index)
    }

    fn playing_world(config: &SimConfig) -> SimWorld {
        let mut world = SimWorld::new(config);
        world.session.state = SessionState::Playing;
        world
    }

    fn wave_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.minion.count_per_wave = 2;
        config.minion.wave_interval_ticks = 100;
        config.minion.spawn_interval_ticks = 10;
        config
    }

    fn minion_count(world: &SimWorld) -> usize {
        world.kinds.values().filter(|kind| **kind == EntityKind::Minion).count()
    }

    #[test]
    fn test_wave_schedule() {
        let config = wave_config();
        let mut world = playing_world(&config);
        let mut clock = TickClock::new(Role::Server, 60);
        let mut run = |world: &mut SimWorld, tick: u32| {
            clock.begin_pass(t(tick), 1);
            spawn_minion_waves(world, &clock, &config);
        };

        run(&mut world, 400);
        assert_eq!(world.waves.next_spawn, t(500));
        assert_eq!(minion_count(&world), 0);

        run(&mut world, 499);
        assert_eq!(minion_count(&world), 0);

        run(&mut world, 500);
        assert_eq!(minion_count(&world), 6);
        assert_eq!(world.waves.next_spawn, t(510));
        assert_eq!(world.waves.spawned_in_wave, 1);

        run(&mut world, 510);
        assert_eq!(minion_count(&world), 12);
        assert_eq!(world.waves, WaveSpawner { next_spawn: t(610), spawned_in_wave: 0 });

        let events = world.take_events();
        assert_eq!(events.len(), 12);
        assert!(events.iter().all(|event| matches!(event.data, GameEventData::MinionSpawned { .. })));
    }

    #[test]
    fn test_waves_are_server_only() {
        let config = wave_config();
        let mut world = playing_world(&config);
        world.waves.next_spawn = t(500);

        let mut client = TickClock::new(Role::Client { connection: ConnectionId(1) }, 60);
        client.begin_pass(t(500), 1);
        spawn_minion_waves(&mut world, &client, &config);
        assert_eq!(minion_count(&world), 0);

        let mut server = TickClock::new(Role::Server, 60);
        server.begin_pass(t(500), 4);
        spawn_minion_waves(&mut world, &server, &config);
        assert_eq!(minion_count(&world), 6);

        server.begin_pass(t(510), 1);
        world.session.state = SessionState::GameOver { winner: TeamType::Blue };
        spawn_minion_waves(&mut world, &server, &config);
        assert_eq!(minion_count(&world), 6);
    }

    #[test]
    fn test_disabled_waves_never_schedule() {
        let mut config = wave_config();
        config.minion.count_per_wave = 0;
        let mut world = playing_world(&config);
        let mut clock = TickClock::new(Role::Server, 60);
        clock.begin_pass(t(400), 1);
        spawn_minion_waves(&mut world, &clock, &config);
        assert!(!world.waves.next_spawn.is_valid());
    }

    #[test]
    fn test_minions_follow_lane() {
        let mut config = SimConfig::default();
        config.minion.move_speed = from_int(60);
        config.minion.top_lane = vec![
            FixedVec2::from_ints(0, 0),
            FixedVec2::from_ints(0, 4),
            FixedVec2::from_ints(4, 4),
        ];
        let mut world = playing_world(&config);
        let blue = world.spawn(prefab::minion(&config, TeamType::Blue, Lane::Top).unwrap());
        let red = world.spawn(prefab::minion(&config, TeamType::Red, Lane::Top).unwrap());

        move_minions(&mut world, &config);
        assert_eq!(world.positions[&blue], FixedVec2::from_ints(0, 1));
        assert_eq!(world.positions[&red], FixedVec2::from_ints(3, 4));
        assert_eq!(world.minions[&blue].path_index, 1);

        for _ in 0..20 {
            move_minions(&mut world, &config);
        }
        let held = world.positions.clone();
        move_minions(&mut world, &config);
        assert_eq!(world.positions, held);

        let reach = config.minion.waypoint_radius;
        assert!(world.positions[&blue].distance(FixedVec2::from_ints(4, 4)) <= reach);
        assert!(world.positions[&red].distance(FixedVec2::ZERO) <= reach);
        assert_eq!(world.minions[&blue].path_index, 2);
        assert_eq!(world.minions[&red].path_index, 2);
    }

    #[test]
    fn test_minions_hold_outside_play() {
        let config = SimConfig::default();
        let mut world = SimWorld::new(&config);
        let id = world.spawn(prefab::minion(&config, TeamType::Blue, Lane::Mid).unwrap());
        move_minions(&mut world, &config);
        assert_eq!(world.positions[&id], config.minion.mid_lane[0]);

        world.session.state = SessionState::Playing;
        world.destroy_tags.insert(id);
        move_minions(&mut world, &config);
        assert_eq!(world.positions[&id], config.minion.mid_lane[0]);
    }
}
