//! Simulation Driver
//!
//! Owns a world, its clock and the recorded inputs, and runs passes over them.
//!
//! ```text
//!   server:  advance ──▶ advance ──▶ advance ──▶ snapshot ──▶ clients
//!
//!   client:  advance (predict) ──▶ advance ──▶ snapshot arrives
//!                                                  │
//!                         restore confirmed world ◀┘
//!                                  │
//!                  replay confirmed+1 ..= newest predicted
//!                  (batches of max_resimulation_batch)
//! ```
//!
//! The server also keeps a [`MatchRecord`] of joins and inputs so a match can
//! be replayed from scratch and its hash compared.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SimConfig};
use crate::core::hash::StateHash;
use crate::core::history::HistoryError;
use crate::core::tick::SimulationTick;
use crate::game::clock::{ConnectionId, Role, TickClock};
use crate::game::collision::{CircleResolver, CollisionResolver};
use crate::game::input::{InputFrame, InputLog};
use crate::game::prefab;
use crate::game::session::{request_entry, SessionError};
use crate::game::state::{EntityId, SimWorld, TeamType};
use crate::game::tick::{simulate_tick, TickResult};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::replication::{ReplicationError, WorldSnapshot};
use crate::network::transport::{Outbox, Recipient};

/// Errors surfaced by the driver.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Entry request rejected.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Input arrived out of order.
    #[error("input rejected: {0}")]
    Input(#[from] HistoryError),

    /// Snapshot could not be used.
    #[error("replication error: {0}")]
    Replication(#[from] ReplicationError),
}

/// A join accepted by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRecord {
    /// Newest simulated tick when the join was processed
    pub after: SimulationTick,
    /// Joining connection
    pub connection: ConnectionId,
    /// Team as requested
    pub requested: TeamType,
}

/// Everything needed to replay a server match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match identifier (UUID bytes)
    pub match_id: [u8; 16],
    /// Accepted joins, in order
    pub joins: Vec<JoinRecord>,
    /// Non-idle inputs by tick index
    pub inputs: BTreeMap<u32, BTreeMap<ConnectionId, InputFrame>>,
    /// Last simulated tick
    pub last_tick: SimulationTick,
}

/// A world plus the machinery to step, predict and roll it back.
#[derive(Debug)]
pub struct Simulation<R: CollisionResolver = CircleResolver> {
    config: SimConfig,
    clock: TickClock,
    world: SimWorld,
    inputs: InputLog,
    resolver: R,
    outbox: Outbox,
    last_confirmed: Option<SimulationTick>,
    record: Option<MatchRecord>,
}

impl Simulation<CircleResolver> {
    /// Authoritative server with both bases in place.
    pub fn server(config: SimConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut world = SimWorld::new(&config);
        prefab::setup_arena(&mut world, &config);
        let clock = TickClock::new(Role::Server, config.tick_rate);
        let record = MatchRecord {
            match_id: uuid::Uuid::new_v4().into_bytes(),
            ..MatchRecord::default()
        };
        info!(match_id = %hex::encode(record.match_id), tick_rate = config.tick_rate, "server simulation created");
        Ok(Self::assemble(config, clock, world, CircleResolver, Some(record)))
    }

    /// Predicting client starting from a confirmed snapshot.
    pub fn client(config: SimConfig, connection: ConnectionId, snapshot: &WorldSnapshot) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut clock = TickClock::new(Role::Client { connection }, config.tick_rate);
        if snapshot.tick.is_valid() {
            clock.sync_to(snapshot.tick);
        }
        let world = snapshot.world.clone();
        let mut sim = Self::assemble(config, clock, world, CircleResolver, None);
        sim.last_confirmed = Some(snapshot.tick);
        info!(%connection, tick = %snapshot.tick, "client simulation created");
        Ok(sim)
    }

    /// Replay a recorded server match from scratch.
    pub fn replay(config: SimConfig, record: &MatchRecord) -> Result<Self, SimulationError> {
        let mut sim = Self::server(config)?;
        if let Some(own) = sim.record.as_mut() {
            own.match_id = record.match_id;
        }
        let mut joins = record.joins.iter().peekable();

        loop {
            let newest = sim.clock.newest_predicted_tick();
            while let Some(join) = joins.next_if(|join| join.after == newest) {
                sim.request_entry(join.connection, join.requested)?;
            }
            let finished = !record.last_tick.is_valid()
                || (newest.is_valid() && !record.last_tick.is_newer_than(newest));
            if finished {
                break;
            }

            let tick = sim.next_tick();
            if let Some(frames) = record.inputs.get(&tick.tick_index()) {
                for (connection, frame) in frames {
                    sim.record_input(*connection, tick, *frame)?;
                }
            }
            sim.advance();
        }

        sim.outbox.drain().for_each(drop);
        Ok(sim)
    }
}

impl<R: CollisionResolver> Simulation<R> {
    fn assemble(config: SimConfig, clock: TickClock, world: SimWorld, resolver: R, record: Option<MatchRecord>) -> Self {
        let inputs = InputLog::new(config.history_window_ticks);
        Self {
            config,
            clock,
            world,
            inputs,
            resolver,
            outbox: Outbox::default(),
            last_confirmed: None,
            record,
        }
    }

    /// Tick the next [`advance`](Self::advance) will simulate.
    pub fn next_tick(&self) -> SimulationTick {
        let newest = self.clock.newest_predicted_tick();
        if newest.is_valid() {
            newest.add(1)
        } else {
            SimulationTick::new(1)
        }
    }

    /// Simulate the next tick for the first time.
    pub fn advance(&mut self) -> TickResult {
        let tick = self.next_tick();
        if let Some(record) = self.record.as_mut() {
            let frames: BTreeMap<ConnectionId, InputFrame> = self
                .inputs
                .inputs_at(tick)
                .into_iter()
                .filter(|(_, frame)| !frame.is_idle())
                .collect();
            if !frames.is_empty() {
                record.inputs.insert(tick.tick_index(), frames);
            }
            record.last_tick = tick;
        }
        self.run_pass(tick, 1)
    }

    fn run_pass(&mut self, tick: SimulationTick, batch_size: u32) -> TickResult {
        self.clock.begin_pass(tick, batch_size);
        let inputs = self.inputs.inputs_at(tick);
        simulate_tick(
            &mut self.world,
            &self.clock,
            &self.config,
            &inputs,
            &self.resolver,
            &mut self.outbox,
        )
    }

    /// Store `connection`'s input for `tick`.
    pub fn record_input(&mut self, connection: ConnectionId, tick: SimulationTick, frame: InputFrame) -> Result<(), SimulationError> {
        if self.clock.is_server() && self.clock.newest_predicted_tick().is_valid() && !tick.is_newer_than(self.clock.newest_predicted_tick()) {
            debug!(%connection, %tick, "late input dropped");
            return Ok(());
        }
        self.inputs.record(connection, tick, frame)?;
        Ok(())
    }

    /// Server: admit a connection. See [`request_entry`].
    pub fn request_entry(&mut self, connection: ConnectionId, requested: TeamType) -> Result<EntityId, SimulationError> {
        let champion = request_entry(
            &mut self.world,
            &self.clock,
            &self.config,
            connection,
            requested,
            &mut self.outbox,
        )?;
        if let Some(record) = self.record.as_mut() {
            record.joins.push(JoinRecord {
                after: self.clock.newest_predicted_tick(),
                connection,
                requested,
            });
        }
        Ok(champion)
    }

    /// Server: handle a message from a client.
    pub fn handle_client_message(&mut self, connection: ConnectionId, message: ClientMessage) -> Result<(), SimulationError> {
        match message {
            ClientMessage::TeamRequest { team } => {
                if let Err(err) = self.request_entry(connection, team) {
                    warn!(%connection, error = %err, "entry rejected");
                    return Err(err);
                }
                Ok(())
            }
            ClientMessage::Input { tick, frame } => self.record_input(connection, tick, frame),
        }
    }

    /// Server: a connection went away. Its buffered inputs are dropped and
    /// its champion idles from the next tick on.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.inputs.remove(connection);
        info!(%connection, tick = %self.clock.newest_predicted_tick(), "connection dropped");
    }

    /// Client: roll back to `snapshot` and replay every tick predicted since.
    ///
    /// Snapshots no newer than the last one applied are ignored.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) -> Vec<TickResult> {
        if self.clock.is_server() {
            warn!(tick = %snapshot.tick, "server ignores snapshots");
            return Vec::new();
        }
        if !snapshot.tick.is_valid() && self.clock.newest_predicted_tick().is_valid() {
            debug!("lobby snapshot ignored after the first tick");
            return Vec::new();
        }
        if let Some(last) = self.last_confirmed {
            if last.is_valid() && snapshot.tick.is_valid() && !snapshot.tick.is_newer_than(last) {
                debug!(tick = %snapshot.tick, %last, "stale snapshot ignored");
                return Vec::new();
            }
        }

        self.world.restore_from(&snapshot.world, snapshot.tick);
        self.last_confirmed = Some(snapshot.tick);

        let newest = self.clock.newest_predicted_tick();
        if !newest.is_valid() || !newest.is_newer_than(snapshot.tick) {
            self.clock.sync_to(snapshot.tick);
            return Vec::new();
        }
        self.resimulate(snapshot.tick, newest)
    }

    fn resimulate(&mut self, confirmed: SimulationTick, newest: SimulationTick) -> Vec<TickResult> {
        let total = newest.ticks_since(confirmed).max(0) as u32;
        if total > self.config.history_window_ticks {
            warn!(%confirmed, %newest, window = self.config.history_window_ticks, "rollback deeper than history window");
        }
        let max_batch = self.config.max_resimulation_batch.max(1);

        let mut results = Vec::with_capacity(total as usize);
        let mut tick = confirmed;
        let mut remaining = total;
        while remaining > 0 {
            let batch = remaining.min(max_batch);
            for _ in 0..batch {
                tick = tick.add(1);
                results.push(self.run_pass(tick, batch));
            }
            remaining -= batch;
        }
        debug!(%confirmed, %newest, ticks = total, "resimulated");
        results
    }

    /// Client: handle a message from the server.
    pub fn receive(&mut self, message: &ServerMessage) -> Result<Vec<TickResult>, SimulationError> {
        if self.clock.is_server() {
            warn!(kind = message.kind(), "server ignores server messages");
            return Ok(Vec::new());
        }
        match message {
            ServerMessage::PlayersRemainingToStart { count } => {
                self.world.session.receive_players_remaining(*count);
            }
            ServerMessage::GameStartTick { target_tick } => {
                self.world.session.receive_countdown(*target_tick);
            }
            ServerMessage::GameOver { winner } => {
                self.world.session.receive_game_over(*winner);
            }
            ServerMessage::Snapshot { tick, payload } => {
                let snapshot = WorldSnapshot::from_message(*tick, payload)?;
                return Ok(self.apply_snapshot(&snapshot));
            }
        }
        Ok(Vec::new())
    }

    /// Confirmed state at the newest simulated tick.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.clock.newest_predicted_tick(), &self.world)
    }

    /// Server: queue a snapshot for every client.
    pub fn broadcast_snapshot(&mut self) -> Result<(), SimulationError> {
        let message = self.snapshot().to_message()?;
        self.outbox.broadcast(message);
        Ok(())
    }

    /// Take the messages produced since the last call.
    pub fn drain_outbox(&mut self) -> Vec<(Recipient, ServerMessage)> {
        self.outbox.drain().collect()
    }

    /// Outbox, for handing to a transport.
    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    /// Hash of replicated state at the newest simulated tick.
    pub fn state_hash(&self) -> StateHash {
        self.world.compute_hash(self.clock.newest_predicted_tick())
    }

    /// World.
    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Mutable world.
    pub fn world_mut(&mut self) -> &mut SimWorld {
        &mut self.world
    }

    /// Clock.
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// Configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Last confirmed tick applied (clients).
    pub fn last_confirmed(&self) -> Option<SimulationTick> {
        self.last_confirmed
    }

    /// Replay record (servers).
    pub fn record(&self) -> Option<&MatchRecord> {
        self.record.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use crate::game::session::SessionState;

    fn t(index: u32) -> SimulationTick {
        SimulationTick::new(index)
    }

    fn two_player_server() -> Simulation {
        let mut server = Simulation::server(SimConfig::default()).unwrap();
        server.request_entry(ConnectionId(1), TeamType::Blue).unwrap();
        server.request_entry(ConnectionId(2), TeamType::Red).unwrap();
        server
    }

    #[test]
    fn test_server_ticks_from_one() {
        let mut server = two_player_server();
        assert_eq!(server.next_tick(), t(1));
        let result = server.advance();
        assert_eq!(result.tick, t(1));
        assert!(result.first_pass);
        assert_eq!(server.next_tick(), t(2));
    }

    #[test]
    fn test_lobby_joins_reported_on_first_tick() {
        let mut server = two_player_server();
        let result = server.advance();

        let kinds: Vec<_> = result
            .events
            .iter()
            .map(|event| match event.data {
                GameEventData::PlayerJoined { connection, .. } => format!("joined {}", connection.0),
                GameEventData::CountdownStarted { .. } => "countdown".to_string(),
                _ => "other".to_string(),
            })
            .collect();
        assert_eq!(&kinds[..3], &["joined 1", "joined 2", "countdown"]);
        assert!(!result.events[0].tick.is_valid());
        assert_eq!(result.events[2].tick, t(1));
    }

    #[test]
    fn test_lobby_snapshot_ignored_after_first_tick() {
        let server = two_player_server();
        let lobby = server.snapshot();
        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &lobby).unwrap();
        for _ in 0..3 {
            client.advance();
        }

        assert!(client.apply_snapshot(&lobby).is_empty());
        assert_eq!(client.clock().newest_predicted_tick(), t(3));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig { tick_rate: 0, ..SimConfig::default() };
        assert!(matches!(Simulation::server(config), Err(SimulationError::Config(_))));
    }

    #[test]
    fn test_client_entry_not_authoritative() {
        let server = two_player_server();
        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &server.snapshot()).unwrap();
        assert!(matches!(
            client.request_entry(ConnectionId(3), TeamType::Blue),
            Err(SimulationError::Session(SessionError::NotAuthoritative))
        ));
    }

    #[test]
    fn test_snapshot_resimulates_in_batches() {
        let mut server = two_player_server();
        for _ in 0..10 {
            server.advance();
        }
        let snapshot = server.snapshot();
        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &snapshot).unwrap();
        for _ in 0..20 {
            assert!(client.advance().first_pass);
        }
        for _ in 0..10 {
            server.advance();
        }

        let results = client.apply_snapshot(&server.snapshot());
        let ticks: Vec<u32> = results.iter().map(|result| result.tick.tick_index()).collect();
        assert_eq!(ticks, (21..=30).collect::<Vec<_>>());
        assert!(results.iter().all(|result| !result.first_pass));
        assert_eq!(client.clock().resimulation_batch_size(), 2);
        assert_eq!(client.clock().newest_predicted_tick(), t(30));
        assert_eq!(client.last_confirmed(), Some(t(20)));
    }

    #[test]
    fn test_stale_snapshot_ignored() {
        let mut server = two_player_server();
        server.advance();
        let old = server.snapshot();
        server.advance();
        let new = server.snapshot();

        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &new).unwrap();
        client.advance();
        assert!(client.apply_snapshot(&old).is_empty());
        assert!(client.apply_snapshot(&new).is_empty());
        assert_eq!(client.last_confirmed(), Some(t(2)));
    }

    #[test]
    fn test_snapshot_ahead_of_prediction_syncs_clock() {
        let mut server = two_player_server();
        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &server.snapshot()).unwrap();
        for _ in 0..5 {
            server.advance();
        }
        assert!(client.apply_snapshot(&server.snapshot()).is_empty());
        assert_eq!(client.next_tick(), t(6));
        assert_eq!(client.state_hash(), server.state_hash());
    }

    #[test]
    fn test_client_session_messages() {
        let server = two_player_server();
        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &server.snapshot()).unwrap();

        client.receive(&ServerMessage::PlayersRemainingToStart { count: 0 }).unwrap();
        assert_eq!(client.world().session.players_remaining, Some(0));
        client.receive(&ServerMessage::GameStartTick { target_tick: t(301) }).unwrap();
        assert_eq!(client.world().session.state, SessionState::Countdown { target_tick: t(301) });
        client.receive(&ServerMessage::GameOver { winner: TeamType::Red }).unwrap();
        assert_eq!(client.world().session.winner(), Some(TeamType::Red));

        let bogus = ServerMessage::Snapshot { tick: t(4), payload: vec![0xff] };
        assert!(matches!(client.receive(&bogus), Err(SimulationError::Replication(_))));
    }

    #[test]
    fn test_handle_client_messages() {
        let mut server = Simulation::server(SimConfig::default()).unwrap();
        server
            .handle_client_message(ConnectionId(7), ClientMessage::TeamRequest { team: TeamType::AutoAssign })
            .unwrap();
        assert!(server.world().champion_of(ConnectionId(7)).is_some());
        assert!(server
            .handle_client_message(ConnectionId(7), ClientMessage::TeamRequest { team: TeamType::Red })
            .is_err());

        let sent: Vec<ServerMessage> = server.drain_outbox().into_iter().map(|(_, message)| message).collect();
        assert_eq!(sent, vec![ServerMessage::PlayersRemainingToStart { count: 1 }]);
    }

    #[test]
    fn test_late_server_input_dropped() {
        let mut server = two_player_server();
        server.advance();
        server.advance();
        let frame = InputFrame::move_to(crate::core::vec2::FixedVec2::from_ints(3, 3));
        server.record_input(ConnectionId(1), t(2), frame).unwrap();
        assert!(server.inputs.frame_at(ConnectionId(1), t(2)).is_idle());
        server.record_input(ConnectionId(1), t(3), frame).unwrap();
        assert_eq!(server.inputs.frame_at(ConnectionId(1), t(3)), frame);
    }

    #[test]
    fn test_disconnect_drops_buffered_inputs() {
        let mut server = two_player_server();
        server.advance();
        let frame = InputFrame::move_to(crate::core::vec2::FixedVec2::from_ints(3, 3));
        server.record_input(ConnectionId(1), t(2), frame).unwrap();
        server.record_input(ConnectionId(2), t(2), frame).unwrap();

        server.disconnect(ConnectionId(1));
        assert!(server.inputs.frame_at(ConnectionId(1), t(2)).is_idle());
        assert_eq!(server.inputs.inputs_at(t(2)).keys().copied().collect::<Vec<_>>(), vec![ConnectionId(2)]);

        server.advance();
        let champion = server.world().champion_of(ConnectionId(1)).unwrap();
        assert_ne!(server.world().champions[&champion].move_target, frame.move_target.unwrap());
        let replayed = Simulation::replay(SimConfig::default(), server.record().unwrap()).unwrap();
        assert_eq!(replayed.state_hash(), server.state_hash());
    }

    #[test]
    fn test_replay_matches_server() {
        let mut server = two_player_server();
        let target = prefab::spawn_position(server.config(), TeamType::Red);
        for tick in 1..=120 {
            if tick % 10 == 0 {
                server.record_input(ConnectionId(1), t(tick), InputFrame::move_to(target)).unwrap();
            }
            server.advance();
        }
        server.request_entry(ConnectionId(3), TeamType::AutoAssign).unwrap();
        for _ in 0..30 {
            server.advance();
        }

        let replayed = Simulation::replay(SimConfig::default(), server.record().unwrap()).unwrap();
        assert_eq!(replayed.clock().newest_predicted_tick(), t(150));
        assert_eq!(replayed.state_hash(), server.state_hash());
        assert!(replayed.world().champion_of(ConnectionId(3)).is_some());
        assert_eq!(replayed.record(), server.record());
    }

    #[test]
    fn test_countdown_events_only_on_first_pass() {
        let mut server = two_player_server();
        let first = server.advance();
        assert!(first.events.iter().any(|event| matches!(event.data, GameEventData::CountdownStarted { .. })));

        let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &server.snapshot()).unwrap();
        client.advance();
        client.advance();
        server.advance();
        let replayed = client.apply_snapshot(&server.snapshot());
        assert!(replayed.len() == 1 && !replayed[0].first_pass);
    }
}
