//! Network Layer
//!
//! Messages, snapshot replication and an in-process transport.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod replication;
pub mod transport;

pub use protocol::{ClientMessage, ServerMessage};
pub use replication::{EntityView, ReplicationError, SnapshotDiff, WorldSnapshot};
pub use transport::{ClientEndpoint, LoopbackTransport, Outbox, Recipient, TransportError};
