//! Player Input
//!
//! One [`InputFrame`] per connection per tick. Button flags are events: they
//! apply only to the tick they were captured for. Inputs are kept in a tick
//! history so a client can replay them when it resimulates.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::history::{TickHistory, HistoryError};
use crate::core::tick::SimulationTick;
use crate::core::vec2::FixedVec2;
use crate::game::clock::ConnectionId;

// =============================================================================
// INPUT FRAME
// =============================================================================

/// Input state for a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Action flags (packed bits):
    /// - Bit 0: AOE ability pressed
    /// - Bit 1: Skill shot aim pressed
    /// - Bit 2: Skill shot confirmed
    /// - Bit 3: Skill shot cancelled
    /// - Bit 4-7: Reserved
    pub flags: u8,

    /// Ground point under the cursor.
    pub aim: FixedVec2,

    /// New walk destination, if the player clicked one this tick.
    pub move_target: Option<FixedVec2>,
}

impl InputFrame {
    /// AOE flag bit
    pub const FLAG_AOE: u8 = 0x01;

    /// Skill shot aim flag bit
    pub const FLAG_SKILL_SHOT: u8 = 0x02;

    /// Skill shot confirm flag bit
    pub const FLAG_CONFIRM: u8 = 0x04;

    /// Skill shot cancel flag bit
    pub const FLAG_CANCEL: u8 = 0x08;

    /// Create an empty input frame.
    pub const fn new() -> Self {
        Self {
            flags: 0,
            aim: FixedVec2::ZERO,
            move_target: None,
        }
    }

    /// Frame that walks toward `target`.
    pub const fn move_to(target: FixedVec2) -> Self {
        Self {
            flags: 0,
            aim: FixedVec2::ZERO,
            move_target: Some(target),
        }
    }

    /// Frame with the given flags aimed at `aim`.
    pub const fn with_flags(flags: u8, aim: FixedVec2) -> Self {
        Self {
            flags,
            aim,
            move_target: None,
        }
    }

    /// AOE pressed this tick.
    #[inline]
    pub fn aoe_pressed(&self) -> bool {
        self.flags & Self::FLAG_AOE != 0
    }

    /// Skill shot aim pressed this tick.
    #[inline]
    pub fn skill_shot_pressed(&self) -> bool {
        self.flags & Self::FLAG_SKILL_SHOT != 0
    }

    /// Skill shot confirmed this tick.
    #[inline]
    pub fn confirm_pressed(&self) -> bool {
        self.flags & Self::FLAG_CONFIRM != 0
    }

    /// Skill shot cancelled this tick.
    #[inline]
    pub fn cancel_pressed(&self) -> bool {
        self.flags & Self::FLAG_CANCEL != 0
    }

    /// No flags and no movement.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.flags == 0 && self.move_target.is_none()
    }

    /// Set or clear a flag.
    #[inline]
    pub fn set_flag(&mut self, flag: u8, pressed: bool) {
        if pressed {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }
}

// =============================================================================
// INPUT LOG
// =============================================================================

/// Recorded inputs of every connection.
#[derive(Clone, Debug, Default)]
pub struct InputLog {
    window: u32,
    frames: BTreeMap<ConnectionId, TickHistory<InputFrame>>,
}

impl InputLog {
    /// Empty log keeping `window` ticks per connection.
    pub fn new(window: u32) -> Self {
        Self {
            window,
            frames: BTreeMap::new(),
        }
    }

    /// Record the input of `connection` for `tick`.
    pub fn record(
        &mut self,
        connection: ConnectionId,
        tick: SimulationTick,
        frame: InputFrame,
    ) -> Result<(), HistoryError> {
        let window = self.window;
        self.frames
            .entry(connection)
            .or_insert_with(|| TickHistory::new(window))
            .record(tick, frame)
    }

    /// Input of `connection` for exactly `tick`; idle when none was captured.
    pub fn frame_at(&self, connection: ConnectionId, tick: SimulationTick) -> InputFrame {
        self.frames
            .get(&connection)
            .and_then(|history| history.lookup_entry(tick))
            .filter(|(recorded, _)| *recorded == tick)
            .map(|(_, frame)| *frame)
            .unwrap_or_default()
    }

    /// Inputs of every known connection for `tick`.
    pub fn inputs_at(&self, tick: SimulationTick) -> BTreeMap<ConnectionId, InputFrame> {
        self.frames
            .keys()
            .map(|connection| (*connection, self.frame_at(*connection, tick)))
            .collect()
    }

    /// Forget a connection.
    pub fn remove(&mut self, connection: ConnectionId) {
        self.frames.remove(&connection);
    }
}
