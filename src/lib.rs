//! # Lane Clash Simulation Core
//!
//! Deterministic, predicted simulation for a two-team lane battle game.
//! The same step runs on the server and on every client; clients run ahead
//! of the server and replay past ticks when a confirmed snapshot arrives.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  LANE CLASH SIMULATION                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  config.rs       - Simulation settings (env / JSON)          │
//! │                                                              │
//! │  core/           - Deterministic primitives                  │
//! │  ├── tick.rs     - Wrapping simulation tick                  │
//! │  ├── history.rs  - Tick-indexed history buffer               │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector with fixed-point                │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── clock.rs    - Role and first-pass tracking              │
//! │  ├── state.rs    - Entity tables                             │
//! │  ├── session.rs  - Lobby / countdown / playing / game over   │
//! │  ├── cooldown.rs - Ability and NPC attack timers             │
//! │  ├── minion.rs   - Minion waves and lane walking             │
//! │  ├── damage.rs   - Buffer, commit, apply                     │
//! │  ├── lifecycle.rs- Destroy and respawn                       │
//! │  ├── tick.rs     - One simulation pass                       │
//! │  └── simulation.rs - Prediction and rollback driver          │
//! │                                                              │
//! │  network/        - Messaging (non-deterministic)             │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── replication.rs - World snapshots                        │
//! │  └── transport.rs - Outbox and loopback channels             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - Side effects gated on the first full prediction of a tick
//!
//! Replaying the same inputs from the same confirmed state produces the
//! same state hash on the server, on every client and in an offline replay.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{ConfigError, SimConfig};
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::tick::SimulationTick;
pub use core::vec2::FixedVec2;
pub use game::input::InputFrame;
pub use game::simulation::{Simulation, SimulationError};
pub use game::state::{EntityId, SimWorld, TeamType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
