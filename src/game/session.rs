//! Session State Machine
//!
//! Drives a match from lobby to game over. The server admits players and
//! starts the countdown; every role flips to playing on the same tick by
//! comparing its clock against the broadcast target tick.
//!
//! ```text
//!  WaitingForPlayers ──(enough players, server)──▶ Countdown{target}
//!         ▲                                             │
//!         │                          current ≥ target (every role)
//!         │                                             ▼
//!         └──── never ───── GameOver{winner} ◀──── Playing
//!                                 (a game-ending entity is destroyed)
//! ```

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::core::hash::StateHasher;
use crate::core::tick::SimulationTick;
use crate::core::vec2::FixedVec2;
use crate::game::clock::{ConnectionId, TickClock};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::prefab;
use crate::game::state::{EntityId, SimWorld, TeamType};
use crate::network::protocol::ServerMessage;
use crate::network::transport::Outbox;

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Requested team has no free slot
    #[error("team {0:?} is full")]
    TeamFull(TeamType),

    /// Requested team cannot be joined
    #[error("team {0:?} cannot be joined")]
    InvalidTeam(TeamType),

    /// Connection already has a champion
    #[error("{0} already joined")]
    AlreadyJoined(ConnectionId),

    /// The game has ended
    #[error("game is over")]
    GameEnded,

    /// Only the server admits players
    #[error("only the server can admit players")]
    NotAuthoritative,
}

// =============================================================================
// STATE
// =============================================================================

/// Session phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Lobby
    #[default]
    WaitingForPlayers,
    /// Counting down to the start tick
    Countdown {
        /// Tick at which play begins
        target_tick: SimulationTick,
    },
    /// Game in progress
    Playing,
    /// Game finished
    GameOver {
        /// Winning team
        winner: TeamType,
    },
}

impl SessionState {
    fn tag(self) -> u8 {
        match self {
            SessionState::WaitingForPlayers => 0,
            SessionState::Countdown { .. } => 1,
            SessionState::Playing => 2,
            SessionState::GameOver { .. } => 3,
        }
    }
}

/// Where and for which team a player spawns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSpawnInfo {
    /// Team
    pub team: TeamType,
    /// Spawn point
    pub spawn_position: FixedVec2,
}

/// Player counts per team.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    /// Blue players
    pub blue: u32,
    /// Red players
    pub red: u32,
}

impl TeamRoster {
    /// Players on `team`.
    pub fn count(&self, team: TeamType) -> u32 {
        match team {
            TeamType::Blue => self.blue,
            TeamType::Red => self.red,
            _ => 0,
        }
    }

    /// Players on both teams.
    pub fn total(&self) -> u32 {
        self.blue + self.red
    }

    fn add(&mut self, team: TeamType) {
        match team {
            TeamType::Blue => self.blue += 1,
            TeamType::Red => self.red += 1,
            _ => {}
        }
    }
}

/// Match session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Current phase
    pub state: SessionState,
    /// Player counts
    pub roster: TeamRoster,
    /// Spawn info per admitted connection
    pub players: BTreeMap<ConnectionId, PlayerSpawnInfo>,
    /// Last announced number of players still needed
    pub players_remaining: Option<u32>,
}

impl Session {
    /// Is the game being played?
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    /// Winner once the game is over.
    pub fn winner(&self) -> Option<TeamType> {
        match self.state {
            SessionState::GameOver { winner } => Some(winner),
            _ => None,
        }
    }

    /// Resolve a team request against the roster.
    ///
    /// `AutoAssign` picks the smaller team; ties go to Blue.
    pub fn resolve_team(&self, requested: TeamType, max_per_team: u32) -> Result<TeamType, SessionError> {
        let team = match requested {
            TeamType::AutoAssign => {
                if self.roster.red < self.roster.blue {
                    TeamType::Red
                } else {
                    TeamType::Blue
                }
            }
            TeamType::Blue | TeamType::Red => requested,
            TeamType::None => return Err(SessionError::InvalidTeam(requested)),
        };
        if self.roster.count(team) >= max_per_team {
            return Err(SessionError::TeamFull(team));
        }
        Ok(team)
    }

    /// Players still needed before the countdown can start.
    pub fn players_needed(&self, config: &SimConfig) -> u32 {
        config.session.min_players_to_start.saturating_sub(self.roster.total())
    }

    /// Whole seconds left in the countdown, rounded up.
    pub fn countdown_seconds_remaining(&self, clock: &TickClock) -> Option<u32> {
        match self.state {
            SessionState::Countdown { target_tick } => Some(clock.whole_seconds_until(target_tick)),
            _ => None,
        }
    }

    /// Client: the server announced the countdown target.
    ///
    /// Re-delivery is harmless: only the lobby accepts it.
    pub fn receive_countdown(&mut self, target_tick: SimulationTick) {
        match self.state {
            SessionState::WaitingForPlayers => {
                self.state = SessionState::Countdown { target_tick };
            }
            other => debug!(?other, %target_tick, "countdown announcement ignored"),
        }
    }

    /// Client: the server announced the number of players still needed.
    pub fn receive_players_remaining(&mut self, count: u32) {
        self.players_remaining = Some(count);
    }

    /// Client: the server announced the end of the game.
    pub fn receive_game_over(&mut self, winner: TeamType) {
        if self.winner().is_none() {
            self.state = SessionState::GameOver { winner };
        }
    }

    /// Playing → GameOver. Returns false (and changes nothing) otherwise.
    pub fn end_game(&mut self, winner: TeamType) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.state = SessionState::GameOver { winner };
        true
    }

    /// Hash the replicated session fields.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.state.tag());
        match self.state {
            SessionState::Countdown { target_tick } => hasher.update_tick(target_tick),
            SessionState::GameOver { winner } => hasher.update_u8(winner as u8),
            _ => {}
        }
        hasher.update_u32(self.roster.blue);
        hasher.update_u32(self.roster.red);
        for (connection, info) in &self.players {
            hasher.update_u32(connection.0);
            hasher.update_u8(info.team as u8);
            hasher.update_vec2(info.spawn_position);
        }
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Server: admit `connection` to the game and spawn its champion.
pub fn request_entry(
    world: &mut SimWorld,
    clock: &TickClock,
    config: &SimConfig,
    connection: ConnectionId,
    requested: TeamType,
    outbox: &mut Outbox,
) -> Result<EntityId, SessionError> {
    if !clock.is_server() {
        return Err(SessionError::NotAuthoritative);
    }
    if world.session.winner().is_some() {
        return Err(SessionError::GameEnded);
    }
    if world.session.players.contains_key(&connection) {
        return Err(SessionError::AlreadyJoined(connection));
    }
    let team = world
        .session
        .resolve_team(requested, config.session.max_players_per_team)?;

    let spawn_position = prefab::spawn_position(config, team);
    let champion = world.spawn(prefab::champion(config, team, connection, spawn_position));
    world.session.players.insert(connection, PlayerSpawnInfo { team, spawn_position });
    world.session.roster.add(team);

    let remaining = world.session.players_needed(config);
    world.session.players_remaining = Some(remaining);
    outbox.broadcast(ServerMessage::PlayersRemainingToStart { count: remaining });

    world.push_event(GameEvent::session(
        clock.current_tick(),
        GameEventData::PlayerJoined { connection, team, champion },
    ));
    info!(%connection, ?team, %champion, remaining, "player joined");
    Ok(champion)
}

/// Per-pass session transitions.
pub fn update_session(world: &mut SimWorld, clock: &TickClock, config: &SimConfig, outbox: &mut Outbox) {
    let current = clock.current_tick();

    if clock.is_server()
        && clock.is_first_full_prediction()
        && world.session.state == SessionState::WaitingForPlayers
        && world.session.roster.total() >= config.session.min_players_to_start
    {
        let target_tick = current.add(config.seconds_to_ticks(config.session.countdown_seconds));
        world.session.state = SessionState::Countdown { target_tick };
        outbox.broadcast(ServerMessage::GameStartTick { target_tick });
        world.push_event(GameEvent::session(current, GameEventData::CountdownStarted { target_tick }));
        info!(%current, %target_tick, "countdown started");
    }

    // Runs on every pass so a replayed tick reaches Playing at the same tick.
    if let SessionState::Countdown { target_tick } = world.session.state {
        if current.has_reached(target_tick) {
            world.session.state = SessionState::Playing;
            if clock.is_first_full_prediction() {
                world.push_event(GameEvent::session(current, GameEventData::GameStarted));
                info!(%current, "game started");
            }
        }
    }
}
