//! Core deterministic primitives.
//!
//! Everything here is bit-identical across platforms and roles: the tick
//! time base, tick-indexed history, fixed-point positions and state hashing.

pub mod tick;
pub mod history;
pub mod fixed;
pub mod vec2;
pub mod hash;

// Re-export core types
pub use tick::SimulationTick;
pub use history::{TickHistory, HistoryError, DEFAULT_HISTORY_WINDOW};
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use hash::{StateHash, StateHasher, compute_state_hash};
