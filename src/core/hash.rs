//! State Hashing for Verification
//!
//! Deterministic SHA-256 digests of simulation state, used to check that
//! the server, each client and every resimulation pass reach identical
//! state for the same tick.

use sha2::{Sha256, Digest};

use super::fixed::Fixed;
use super::tick::SimulationTick;
use super::vec2::FixedVec2;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for simulation state.
///
/// Order of updates is part of the hash; callers iterate BTreeMaps.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for the simulation world.
    pub fn for_world() -> Self {
        Self::new(b"LANE_CLASH_WORLD_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fixed value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.update_i32(value);
    }

    /// Update with a FixedVec2.
    #[inline]
    pub fn update_vec2(&mut self, value: FixedVec2) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
    }

    /// Update with a simulation tick (raw encoding, so INVALID is distinct).
    #[inline]
    pub fn update_tick(&mut self, tick: SimulationTick) {
        self.update_u32(tick.to_raw());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Hash world state at `tick`.
///
/// The closure appends the state-specific fields.
pub fn compute_state_hash<F>(tick: SimulationTick, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_world();
    hasher.update_tick(tick);
    add_state(&mut hasher);
    hasher.finalize()
}
