//! Tick Clock
//!
//! Per-pass view of simulation time. A client resimulates the same tick
//! several times after a correction arrives; the clock tells systems which
//! pass is the first full prediction of a tick (side effects allowed) and how
//! many ticks the current batch covers.
//!
//! ```text
//!   confirmed        predicted (first passes)
//!   ────┬──────┬──────┬──────┬──────┬──────▶ tick
//!      100    101    102    103    104
//!        └── resimulated on correction ──┘  (is_first_full_prediction = false)
//! ```

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::tick::SimulationTick;

// =============================================================================
// ROLE
// =============================================================================

/// Per-connection identifier assigned by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Which side of the network this simulation runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Authoritative simulation.
    Server,
    /// Predicting client bound to a connection.
    Client {
        /// The connection this client owns.
        connection: ConnectionId,
    },
}

impl Role {
    /// Is this the authoritative server?
    #[inline]
    pub fn is_server(self) -> bool {
        matches!(self, Role::Server)
    }

    /// Owning connection on a client.
    pub fn connection(self) -> Option<ConnectionId> {
        match self {
            Role::Server => None,
            Role::Client { connection } => Some(connection),
        }
    }
}

// =============================================================================
// TICK CLOCK
// =============================================================================

/// Simulation time as seen by the systems of one pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickClock {
    role: Role,
    tick_rate: u32,
    current: SimulationTick,
    newest_predicted: SimulationTick,
    first_full_prediction: bool,
    batch_size: u32,
}

impl TickClock {
    /// Create a clock that has not run any pass yet.
    pub fn new(role: Role, tick_rate: u32) -> Self {
        Self {
            role,
            tick_rate: tick_rate.max(1),
            current: SimulationTick::INVALID,
            newest_predicted: SimulationTick::INVALID,
            first_full_prediction: false,
            batch_size: 1,
        }
    }

    /// Start a pass over `tick` covering `batch_size` ticks.
    ///
    /// The pass is a first full prediction when `tick` is newer than every
    /// tick simulated before it.
    pub fn begin_pass(&mut self, tick: SimulationTick, batch_size: u32) {
        debug_assert!(tick.is_valid(), "pass started at an invalid tick");
        self.current = tick;
        self.batch_size = batch_size.max(1);
        self.first_full_prediction =
            !self.newest_predicted.is_valid() || tick.is_newer_than(self.newest_predicted);
        if self.first_full_prediction {
            self.newest_predicted = tick;
        }
    }

    /// Treat `tick` as already simulated (a client joining from a snapshot).
    pub fn sync_to(&mut self, tick: SimulationTick) {
        self.current = tick;
        self.newest_predicted = tick;
        self.first_full_prediction = false;
        self.batch_size = 1;
    }

    /// Tick being simulated.
    #[inline]
    pub fn current_tick(&self) -> SimulationTick {
        self.current
    }

    /// Newest tick ever simulated.
    #[inline]
    pub fn newest_predicted_tick(&self) -> SimulationTick {
        self.newest_predicted
    }

    /// Is this the first time the current tick is fully predicted?
    #[inline]
    pub fn is_first_full_prediction(&self) -> bool {
        self.first_full_prediction
    }

    /// Ticks covered by the current pass (at least 1).
    #[inline]
    pub fn resimulation_batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Network role.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Is this the authoritative server?
    #[inline]
    pub fn is_server(&self) -> bool {
        self.role.is_server()
    }

    /// Ticks per second.
    #[inline]
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Whole seconds until `target`, rounded up; 0 once it is reached.
    pub fn whole_seconds_until(&self, target: SimulationTick) -> u32 {
        if !target.is_valid() || !self.current.is_valid() {
            return 0;
        }
        let remaining = target.ticks_since(self.current);
        if remaining <= 0 {
            return 0;
        }
        (remaining as u32).div_ceil(self.tick_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(index: u32) -> SimulationTick {
        SimulationTick::new(index)
    }

    #[test]
    fn test_first_pass_then_resimulation() {
        let mut clock = TickClock::new(Role::Client { connection: ConnectionId(1) }, 60);

        clock.begin_pass(t(100), 1);
        assert!(clock.is_first_full_prediction());
        clock.begin_pass(t(101), 1);
        assert!(clock.is_first_full_prediction());

        // Correction arrives, 100 and 101 are replayed.
        clock.begin_pass(t(100), 2);
        assert!(!clock.is_first_full_prediction());
        assert_eq!(clock.resimulation_batch_size(), 2);
        clock.begin_pass(t(101), 2);
        assert!(!clock.is_first_full_prediction());

        clock.begin_pass(t(102), 1);
        assert!(clock.is_first_full_prediction());
        assert_eq!(clock.newest_predicted_tick(), t(102));
    }

    #[test]
    fn test_batch_size_floor() {
        let mut clock = TickClock::new(Role::Server, 60);
        clock.begin_pass(t(5), 0);
        assert_eq!(clock.resimulation_batch_size(), 1);
        assert!(clock.is_server());
        assert_eq!(clock.role().connection(), None);
    }

    #[test]
    fn test_sync_to_snapshot_tick() {
        let mut clock = TickClock::new(Role::Client { connection: ConnectionId(3) }, 60);
        clock.sync_to(t(500));
        clock.begin_pass(t(500), 1);
        assert!(!clock.is_first_full_prediction());
        clock.begin_pass(t(501), 1);
        assert!(clock.is_first_full_prediction());
    }

    #[test]
    fn test_whole_seconds_until_rounds_up() {
        let mut clock = TickClock::new(Role::Server, 60);
        clock.begin_pass(t(2000), 1);
        assert_eq!(clock.whole_seconds_until(t(2150)), 3);
        assert_eq!(clock.whole_seconds_until(t(2060)), 1);
        assert_eq!(clock.whole_seconds_until(t(2001)), 1);
        assert_eq!(clock.whole_seconds_until(t(2000)), 0);
        assert_eq!(clock.whole_seconds_until(t(1990)), 0);
        assert_eq!(clock.whole_seconds_until(SimulationTick::INVALID), 0);
    }
}
