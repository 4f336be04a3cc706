//! Game Logic Module
//!
//! All game simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `clock`: Role and tick clock for one pass
//! - `state`: Entity tables and the world
//! - `input`: Input frames and the per-connection input log
//! - `events`: Game events for logs and presentation
//! - `session`: Lobby, countdown, playing, game over
//! - `prefab`: Entity templates
//! - `collision`: Contacts and shape queries
//! - `cooldown`: Ability and NPC attack timers
//! - `movement`: Champion and projectile movement
//! - `minion`: Minion waves and lane walking
//! - `damage`: Buffer, commit, apply
//! - `lifecycle`: Destroy timers, destruction, respawn
//! - `tick`: One simulation pass
//! - `simulation`: Prediction, rollback and replay driver
//! - `view`: Presentation summary

pub mod clock;
pub mod state;
pub mod input;
pub mod events;
pub mod session;
pub mod prefab;
pub mod collision;
pub mod cooldown;
pub mod movement;
pub mod minion;
pub mod damage;
pub mod lifecycle;
pub mod tick;
pub mod simulation;
pub mod view;

// Re-export key types
pub use clock::{ConnectionId, Role, TickClock};
pub use state::{EntityId, EntityKind, Lane, SimWorld, TeamType};
pub use input::{InputFrame, InputLog};
pub use events::{GameEvent, GameEventData};
pub use session::{Session, SessionError, SessionState};
pub use collision::{CircleResolver, CollisionResolver};
pub use tick::{simulate_tick, TickResult};
pub use simulation::{MatchRecord, Simulation, SimulationError};
pub use view::PresentationSnapshot;
