//! Simulation Step
//!
//! One pass over one tick. The same function runs on the server, on a client
//! predicting a new tick, and on a client replaying a tick after a rollback;
//! the [`TickClock`] tells the systems which of those they are in.

use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::core::tick::SimulationTick;
use crate::game::clock::{ConnectionId, TickClock};
use crate::game::collision::CollisionResolver;
use crate::game::cooldown::{acquire_npc_targets, process_champion_abilities, process_npc_attacks};
use crate::game::damage::{apply_damage, commit_frame_damage, process_contacts};
use crate::game::events::GameEvent;
use crate::game::input::InputFrame;
use crate::game::lifecycle::{initialize_destroy_timers, process_destroyed, process_respawns, tag_expired};
use crate::game::minion::{move_minions, spawn_minion_waves};
use crate::game::movement::{apply_move_inputs, move_champions, move_projectiles};
use crate::game::session::update_session;
use crate::game::state::{SimWorld, TeamType};
use crate::network::transport::Outbox;

/// Result of a pass.
#[derive(Debug, Clone, Default)]
pub struct TickResult {
    /// Tick that was simulated
    pub tick: SimulationTick,
    /// Events generated this pass, ordered
    pub events: Vec<GameEvent>,
    /// Was this the first full prediction of the tick?
    pub first_pass: bool,
    /// Winner, once the game is over
    pub game_over: Option<TeamType>,
}

/// Run one pass of the tick the clock is on.
///
/// The caller starts the pass with [`TickClock::begin_pass`].
///
/// # Determinism
///
/// Given the same world, clock state and inputs this produces the same world:
/// - every table is a BTreeMap, iterated in id order
/// - positions and speeds are fixed-point
/// - nothing reads the wall clock
pub fn simulate_tick(
    world: &mut SimWorld,
    clock: &TickClock,
    config: &SimConfig,
    inputs: &BTreeMap<ConnectionId, InputFrame>,
    resolver: &dyn CollisionResolver,
    outbox: &mut Outbox,
) -> TickResult {
    world.begin_pass();

    // 1. Inputs and ability casts
    apply_move_inputs(world, inputs);
    process_champion_abilities(world, clock, config, inputs);

    // 2. NPC targeting and attacks
    acquire_npc_targets(world, resolver);
    process_npc_attacks(world, clock, config);

    // 3. Lifetimes of freshly spawned effects
    initialize_destroy_timers(world, clock, config);

    // 4. Movement
    move_champions(world, config);
    move_projectiles(world, config);
    move_minions(world, config);

    // 5. Expired effects
    tag_expired(world, clock);

    // 6. Collision and damage stages
    let contacts = resolver.contacts(world);
    process_contacts(world, &contacts);
    commit_frame_damage(world, clock);
    apply_damage(world, clock);

    // 7. Destruction, respawn and minion waves
    process_destroyed(world, clock, config, outbox);
    process_respawns(world, clock, config);
    spawn_minion_waves(world, clock, config);

    // 8. Session transitions
    update_session(world, clock, config, outbox);

    let mut events = world.take_events();
    events.sort();

    TickResult {
        tick: clock.current_tick(),
        events,
        first_pass: clock.is_first_full_prediction(),
        game_over: world.session.winner(),
    }
}
