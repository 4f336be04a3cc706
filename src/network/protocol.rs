//! Protocol Messages
//!
//! Session and replication messages exchanged between the server and its
//! clients. JSON for debugging, bincode for the wire.

use serde::{Serialize, Deserialize};

use crate::core::tick::SimulationTick;
use crate::game::input::InputFrame;
use crate::game::state::TeamType;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to enter the game on a team (or `AutoAssign`).
    TeamRequest {
        /// Requested team
        team: TeamType,
    },

    /// Player input for a tick.
    Input {
        /// Tick the input applies to
        tick: SimulationTick,
        /// The input frame
        frame: InputFrame,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    /// Players still needed before the countdown starts.
    PlayersRemainingToStart {
        /// Remaining player count
        count: u32,
    },

    /// Countdown started; play begins at `target_tick`.
    GameStartTick {
        /// First playing tick
        target_tick: SimulationTick,
    },

    /// The game ended.
    GameOver {
        /// Winning team
        winner: TeamType,
    },

    /// Confirmed world state (bincode-encoded [`WorldSnapshot`]).
    ///
    /// [`WorldSnapshot`]: crate::network::replication::WorldSnapshot
    Snapshot {
        /// Tick the snapshot was taken at
        tick: SimulationTick,
        /// Encoded snapshot
        payload: Vec<u8>,
    },
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::PlayersRemainingToStart { .. } => "players_remaining_to_start",
            ServerMessage::GameStartTick { .. } => "game_start_tick",
            ServerMessage::GameOver { .. } => "game_over",
            ServerMessage::Snapshot { .. } => "snapshot",
        }
    }
}
