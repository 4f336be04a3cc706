//! Lifecycle Scheduler
//!
//! Timed destruction, destruction handling and champion respawns.
//!
//! ```text
//!  lifetime_ms ──▶ destroy_at ──(reached)──▶ destroy tag ──▶ server: despawn
//!                                   ▲                        │     (+ game over,
//!  hit points ≤ 0 ──────────────────┘                        │      + respawn queue)
//!                                                            └─▶ client: park
//!                                                                 out of world
//! ```
//!
//! Only the server removes entities. A client parks them at the
//! out-of-world position until the next confirmed snapshot drops them.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::core::hash::StateHasher;
use crate::core::tick::SimulationTick;
use crate::game::clock::{ConnectionId, TickClock};
use crate::game::cooldown::clear_aim;
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::prefab;
use crate::game::state::{EntityId, EntityKind, SimWorld};
use crate::network::protocol::ServerMessage;
use crate::network::transport::Outbox;

// =============================================================================
// RESPAWN QUEUE
// =============================================================================

/// One pending respawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnEntry {
    /// Connection whose champion respawns
    pub connection: ConnectionId,
    /// Tick at which the champion returns
    pub respawn_tick: SimulationTick,
}

/// Pending respawns in the order they were queued.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnQueue {
    entries: Vec<RespawnEntry>,
}

impl RespawnQueue {
    /// Queue a respawn.
    pub fn push(&mut self, entry: RespawnEntry) {
        self.entries.push(entry);
    }

    /// Pending entry for `connection`.
    pub fn pending_for(&self, connection: ConnectionId) -> Option<&RespawnEntry> {
        self.entries.iter().find(|entry| entry.connection == connection)
    }

    /// Remove and return every entry due at `current`.
    pub fn take_due(&mut self, current: SimulationTick) -> Vec<RespawnEntry> {
        let (due, pending): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| current.has_reached(entry.respawn_tick));
        self.entries = pending;
        due
    }

    /// Iterate pending entries.
    pub fn iter(&self) -> impl Iterator<Item = &RespawnEntry> {
        self.entries.iter()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash pending entries.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.entries.len() as u32);
        for entry in &self.entries {
            hasher.update_u32(entry.connection.0);
            hasher.update_tick(entry.respawn_tick);
        }
    }
}

// =============================================================================
// DESTROY TIMERS
// =============================================================================

/// Convert pending lifetimes into destroy ticks.
pub fn initialize_destroy_timers(world: &mut SimWorld, clock: &TickClock, config: &SimConfig) {
    let current = clock.current_tick();
    for (id, millis) in std::mem::take(&mut world.destroy_timers) {
        if world.destroy_at.contains_key(&id) {
            continue;
        }
        world.destroy_at.insert(id, current.add(config.millis_to_ticks(millis)));
    }
}

/// Tag every entity whose destroy tick has been reached.
pub fn tag_expired(world: &mut SimWorld, clock: &TickClock) {
    let current = clock.current_tick();
    let expired: Vec<EntityId> = world
        .destroy_at
        .iter()
        .filter(|(id, deadline)| current.has_reached(**deadline) && !world.destroy_tags.contains(*id))
        .map(|(id, _)| *id)
        .collect();
    for id in expired {
        world.destroy_tags.insert(id);
        world.push_event(GameEvent::new(current, EventPriority::Destruction, GameEventData::DestroyTagged { entity: id }));
    }
}

// =============================================================================
// DESTRUCTION
// =============================================================================

/// Handle tagged entities. First passes only.
pub fn process_destroyed(world: &mut SimWorld, clock: &TickClock, config: &SimConfig, outbox: &mut Outbox) {
    if !clock.is_first_full_prediction() {
        return;
    }
    let tagged: Vec<EntityId> = world.destroy_tags.iter().copied().collect();
    if clock.is_server() {
        for id in tagged {
            destroy_on_server(world, clock, config, outbox, id);
        }
    } else {
        for id in tagged {
            hide_on_client(world, clock, config, id);
        }
    }
}

fn destroy_on_server(world: &mut SimWorld, clock: &TickClock, config: &SimConfig, outbox: &mut Outbox, id: EntityId) {
    let current = clock.current_tick();

    if world.game_over_on_destroy.contains(&id) {
        let winner = world.team_of(id).opposing();
        if world.session.end_game(winner) {
            outbox.broadcast(ServerMessage::GameOver { winner });
            world.push_event(GameEvent::session(current, GameEventData::GameOver { winner }));
            info!(entity = %id, ?winner, %current, "game over");
        }
    }

    if let Some(owner) = world.champions.get(&id).map(|champion| champion.owner) {
        // Never the tick of death.
        let respawn_tick = current.add(config.respawn_delay_ticks.max(1));
        world.respawns.push(RespawnEntry { connection: owner, respawn_tick });
        world.push_event(GameEvent::new(
            current,
            EventPriority::Destruction,
            GameEventData::RespawnQueued { connection: owner, respawn_tick },
        ));
        debug!(%owner, %respawn_tick, "respawn queued");
    }

    let kind = world.kinds.get(&id).copied().unwrap_or(EntityKind::Champion);
    world.despawn(id);
    world.push_event(GameEvent::destroyed(current, id, kind));
}

fn hide_on_client(world: &mut SimWorld, clock: &TickClock, config: &SimConfig, id: EntityId) {
    clear_aim(world, id);
    let Some(position) = world.positions.get_mut(&id) else {
        return;
    };
    if *position != config.out_of_world_position {
        *position = config.out_of_world_position;
        world.push_event(GameEvent::new(
            clock.current_tick(),
            EventPriority::Destruction,
            GameEventData::EntityHidden { entity: id },
        ));
    }
}

// =============================================================================
// RESPAWN
// =============================================================================

/// Server: bring back champions whose respawn tick has been reached.
pub fn process_respawns(world: &mut SimWorld, clock: &TickClock, config: &SimConfig) {
    if !clock.is_server() || !clock.is_first_full_prediction() {
        return;
    }
    let current = clock.current_tick();
    for entry in world.respawns.take_due(current) {
        let Some(info) = world.session.players.get(&entry.connection).copied() else {
            debug!(connection = %entry.connection, "respawn dropped for unknown player");
            continue;
        };
        let champion = world.spawn(prefab::champion(config, info.team, entry.connection, info.spawn_position));
        world.push_event(GameEvent::session(
            current,
            GameEventData::Respawned { connection: entry.connection, champion },
        ));
        info!(connection = %entry.connection, %champion, %current, "champion respawned");
    }
}

/// Whole seconds until `connection`'s champion respawns, rounded up.
pub fn respawn_countdown_seconds(world: &SimWorld, clock: &TickClock, connection: ConnectionId) -> Option<u32> {
    world
        .respawns
        .pending_for(connection)
        .map(|entry| clock.whole_seconds_until(entry.respawn_tick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::FixedVec2;
    use crate::game::clock::Role;
    use crate::game::session::{request_entry, SessionState};
    use crate::game::state::TeamType;

    fn t(index: u32) -> SimulationTick {
        SimulationTick::new(index)
    }

    #[test]
    fn test_lifetime_becomes_destroy_tick() {
        let config = SimConfig::default();
        let mut world = SimWorld::new(&config);
        let mut clock = TickClock::new(Role::Server, 60);
        let aoe = world.spawn(prefab::aoe(&config, TeamType::Blue, FixedVec2::ZERO));

        clock.begin_pass(t(100), 1);
        initialize_destroy_timers(&mut world, &clock, &config);
        assert_eq!(world.destroy_at[&aoe], t(130));
        assert!(world.destroy_timers.is_empty());

        clock.begin_pass(t(129), 1);
        tag_expired(&mut world, &clock);
        assert!(!world.destroy_tags.contains(&aoe));
        clock.begin_pass(t(130), 1);
        tag_expired(&mut world, &clock);
        assert!(world.destroy_tags.contains(&aoe));
    }

    #[test]
    fn test_respawn_after_delay() {
        let config = SimConfig::default();
        let mut world = SimWorld::new(&config);
        let mut outbox = Outbox::default();
        let mut clock = TickClock::new(Role::Server, 60);
        clock.begin_pass(t(1), 1);
        let conn = ConnectionId(4);
        let champion = request_entry(&mut world, &clock, &config, conn, TeamType::Red, &mut outbox).unwrap();

        clock.begin_pass(t(2000), 1);
        world.destroy_tags.insert(champion);
        process_destroyed(&mut world, &clock, &config, &mut outbox);
        assert!(!world.contains(champion));
        assert_eq!(
            world.respawns.pending_for(conn),
            Some(&RespawnEntry { connection: conn, respawn_tick: t(2150) })
        );
        assert_eq!(respawn_countdown_seconds(&world, &clock, conn), Some(3));

        clock.begin_pass(t(2149), 1);
        process_respawns(&mut world, &clock, &config);
        assert_eq!(world.respawns.len(), 1);
        assert_eq!(world.champion_of(conn), None);

        clock.begin_pass(t(2150), 1);
        process_respawns(&mut world, &clock, &config);
        assert!(world.respawns.is_empty());
        let respawned = world.champion_of(conn).unwrap();
        assert_eq!(world.positions[&respawned], config.champion.red_spawn);
        assert_eq!(world.team_of(respawned), TeamType::Red);
    }

    #[test]
    fn test_zero_delay_respawns_on_next_tick() {
        let config = SimConfig { respawn_delay_ticks: 0, ..SimConfig::default() };
        let mut world = SimWorld::new(&config);
        let mut outbox = Outbox::default();
        let mut clock = TickClock::new(Role::Server, 60);
        clock.begin_pass(t(1), 1);
        let conn = ConnectionId(4);
        let champion = request_entry(&mut world, &clock, &config, conn, TeamType::Blue, &mut outbox).unwrap();

        clock.begin_pass(t(2000), 1);
        world.destroy_tags.insert(champion);
        process_destroyed(&mut world, &clock, &config, &mut outbox);
        process_respawns(&mut world, &clock, &config);
        let entry = *world.respawns.pending_for(conn).unwrap();
        assert!(entry.respawn_tick.is_newer_than(t(2000)));
        assert_eq!(world.champion_of(conn), None);

        clock.begin_pass(t(2001), 1);
        process_respawns(&mut world, &clock, &config);
        assert!(world.champion_of(conn).is_some());
    }

    #[test]
    fn test_base_destruction_ends_game_once() {
        let config = SimConfig::default();
        let mut world = SimWorld::new(&config);
        world.session.state = SessionState::Playing;
        prefab::setup_arena(&mut world, &config);
        let bases: Vec<EntityId> = world.game_over_on_destroy.iter().copied().collect();
        let mut outbox = Outbox::default();
        let mut clock = TickClock::new(Role::Server, 60);

        clock.begin_pass(t(10), 1);
        world.destroy_tags.insert(bases[1]);
        process_destroyed(&mut world, &clock, &config, &mut outbox);
        assert_eq!(world.session.winner(), Some(TeamType::Blue));

        clock.begin_pass(t(11), 1);
        world.destroy_tags.insert(bases[0]);
        process_destroyed(&mut world, &clock, &config, &mut outbox);
        assert_eq!(world.session.winner(), Some(TeamType::Blue));

        let sent: Vec<_> = outbox.drain().map(|(_, message)| message).collect();
        assert_eq!(sent, vec![ServerMessage::GameOver { winner: TeamType::Blue }]);
    }

    #[test]
    fn test_client_parks_instead_of_removing() {
        let config = SimConfig::default();
        let mut world = SimWorld::new(&config);
        world.session.state = SessionState::Playing;
        prefab::setup_arena(&mut world, &config);
        let champion = world.spawn(prefab::champion(&config, TeamType::Blue, ConnectionId(1), FixedVec2::ZERO));
        world.champions.get_mut(&champion).unwrap().aiming = true;
        let base = *world.game_over_on_destroy.iter().next().unwrap();
        let mut clock = TickClock::new(Role::Client { connection: ConnectionId(1) }, 60);
        let mut outbox = Outbox::default();

        clock.begin_pass(t(10), 1);
        world.destroy_tags.insert(champion);
        world.destroy_tags.insert(base);
        process_destroyed(&mut world, &clock, &config, &mut outbox);

        assert!(world.contains(champion));
        assert_eq!(world.positions[&champion], config.out_of_world_position);
        assert!(!world.champions[&champion].aiming);
        assert!(world.respawns.is_empty());
        assert!(world.session.is_playing(), "clients never end the game locally");
        assert!(outbox.is_empty());
    }
}
