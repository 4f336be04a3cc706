//! Presentation View
//!
//! Read-only summary of a world for whatever draws it: session banner,
//! health bars, cooldown dials and the respawn timer. Never feeds back into
//! the simulation.

use serde::{Serialize, Deserialize};

use crate::config::SimConfig;
use crate::core::tick::SimulationTick;
use crate::game::clock::{ConnectionId, TickClock};
use crate::game::cooldown::{cooldown_ticks, remaining_fraction};
use crate::game::lifecycle::respawn_countdown_seconds;
use crate::game::session::SessionState;
use crate::game::state::{AbilityKind, EntityId, EntityKind, HitPoints, SimWorld, TeamType};

/// Health bar of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBar {
    /// Entity
    pub entity: EntityId,
    /// Kind
    pub kind: EntityKind,
    /// Team
    pub team: TeamType,
    /// Position as raw fixed-point
    pub position: [i32; 2],
    /// Hit points
    pub hit_points: HitPoints,
}

/// What the local player sees of their own champion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPlayerView {
    /// Local connection
    pub connection: ConnectionId,
    /// Champion, while alive
    pub champion: Option<EntityId>,
    /// AOE cooldown remaining, 0.0 to 1.0
    pub aoe_cooldown: f32,
    /// Skill shot cooldown remaining, 0.0 to 1.0
    pub skill_shot_cooldown: f32,
    /// Skill shot aim in progress
    pub aiming: bool,
    /// Whole seconds until respawn
    pub respawn_seconds: Option<u32>,
}

/// Presentation state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationSnapshot {
    /// Tick shown
    pub tick: SimulationTick,
    /// Session state
    pub session: SessionState,
    /// Winner, once decided
    pub winner: Option<TeamType>,
    /// Countdown seconds, while counting down
    pub countdown_seconds: Option<u32>,
    /// Players still needed, as last announced
    pub players_remaining: Option<u32>,
    /// Health bars of visible entities
    pub health: Vec<HealthBar>,
    /// Local player, on clients
    pub local: Option<LocalPlayerView>,
}

impl PresentationSnapshot {
    /// Capture the view of `world` at the clock's current tick.
    pub fn capture(world: &SimWorld, clock: &TickClock, config: &SimConfig, local: Option<ConnectionId>) -> Self {
        let current = clock.current_tick();
        let health = world
            .hit_points
            .iter()
            .filter(|(id, _)| world.is_active(**id))
            .map(|(id, hit_points)| {
                let position = world.positions.get(id).copied().unwrap_or_default();
                HealthBar {
                    entity: *id,
                    kind: world.kinds.get(id).copied().unwrap_or(EntityKind::Champion),
                    team: world.team_of(*id),
                    position: [position.x, position.y],
                    hit_points: *hit_points,
                }
            })
            .collect();

        Self {
            tick: current,
            session: world.session.state,
            winner: world.session.winner(),
            countdown_seconds: world.session.countdown_seconds_remaining(clock),
            players_remaining: world.session.players_remaining,
            health,
            local: local.map(|connection| local_view(world, clock, config, connection)),
        }
    }

    /// Banner text for the session state.
    pub fn banner(&self) -> String {
        match (self.session, self.countdown_seconds, self.players_remaining) {
            (SessionState::WaitingForPlayers, _, Some(count)) => format!("Waiting for {count} more player(s)"),
            (SessionState::WaitingForPlayers, _, None) => "Waiting for players".to_string(),
            (SessionState::Countdown { .. }, Some(seconds), _) => format!("Starting in {seconds}"),
            (SessionState::Countdown { .. }, None, _) => "Starting".to_string(),
            (SessionState::Playing, ..) => String::new(),
            (SessionState::GameOver { winner }, ..) => format!("{winner:?} team wins"),
        }
    }
}

fn local_view(world: &SimWorld, clock: &TickClock, config: &SimConfig, connection: ConnectionId) -> LocalPlayerView {
    let current = clock.current_tick();
    let champion = world.champion_of(connection).filter(|id| world.is_active(*id));
    let fraction = |ability: AbilityKind| {
        champion
            .and_then(|id| world.histories.cooldowns.get(&id))
            .map_or(0.0, |history| remaining_fraction(history, current, ability, cooldown_ticks(config, ability)))
    };

    LocalPlayerView {
        connection,
        champion,
        aoe_cooldown: fraction(AbilityKind::Aoe),
        skill_shot_cooldown: fraction(AbilityKind::SkillShot),
        aiming: champion
            .and_then(|id| world.champions.get(&id))
            .is_some_and(|state| state.aiming),
        respawn_seconds: respawn_countdown_seconds(world, clock, connection),
    }
}
