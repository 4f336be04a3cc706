//! Lane Clash Simulation Demo
//!
//! Runs an authoritative server and two predicting clients in one process,
//! connected by the loopback transport, then replays the server's record and
//! checks that the state hashes agree.

use std::time::Duration;
use anyhow::{bail, Context};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lane_clash::{
    SimConfig, SimulationTick, FixedVec2, TICK_RATE, VERSION,
    game::{
        clock::ConnectionId,
        events::GameEventData,
        input::InputFrame,
        simulation::Simulation,
        state::TeamType,
        tick::TickResult,
        view::PresentationSnapshot,
    },
    network::{
        protocol::ServerMessage,
        replication::WorldSnapshot,
        transport::{ClientEndpoint, LoopbackTransport},
    },
};

/// Ticks each client predicts ahead of the server.
const CLIENT_LEAD_TICKS: u32 = 3;

/// Server snapshot interval in ticks.
const SNAPSHOT_INTERVAL: u32 = 6;

/// Default demo length (two minutes at 60 Hz).
const DEFAULT_MAX_TICKS: u32 = 7200;

struct DemoClient {
    connection: ConnectionId,
    team: TeamType,
    endpoint: ClientEndpoint,
    sim: Simulation,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Lane Clash Simulation v{}", VERSION);

    let config = load_config()?;
    let max_ticks = env_u32("LANE_CLASH_MAX_TICKS")?.unwrap_or(DEFAULT_MAX_TICKS);
    let realtime = std::env::var("LANE_CLASH_REALTIME").is_ok_and(|value| value == "1");
    info!(tick_rate = config.tick_rate, default_rate = TICK_RATE, max_ticks, realtime, "configuration loaded");

    run_demo(config, max_ticks, realtime).await
}

fn load_config() -> anyhow::Result<SimConfig> {
    let config = match std::env::var("LANE_CLASH_CONFIG") {
        Ok(path) => {
            let mut config = SimConfig::from_json_file(&path).with_context(|| format!("loading {path}"))?;
            config.apply_env_overrides()?;
            config
        }
        Err(_) => SimConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn env_u32(key: &str) -> anyhow::Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value.parse().with_context(|| format!("{key}={value}"))?)),
        Err(_) => Ok(None),
    }
}

async fn run_demo(config: SimConfig, max_ticks: u32, realtime: bool) -> anyhow::Result<()> {
    info!("=== Lobby ===");
    let mut server = Simulation::server(config.clone())?;
    let mut transport = LoopbackTransport::new();

    let roster = [(ConnectionId(1), TeamType::Blue), (ConnectionId(2), TeamType::Red)];
    let mut endpoints = Vec::new();
    for (connection, team) in roster {
        let endpoint = transport.connect(connection);
        endpoint.request_team(team)?;
        endpoints.push((connection, team, endpoint));
    }
    for (connection, message) in transport.poll_client_messages() {
        if let Err(err) = server.handle_client_message(connection, message) {
            warn!(%connection, error = %err, "team request rejected");
        }
    }
    server.broadcast_snapshot()?;
    transport.deliver(server.outbox_mut())?;

    let mut clients = Vec::new();
    for (connection, team, mut endpoint) in endpoints {
        let messages = endpoint.drain()?;
        let Some(snapshot) = messages.iter().find_map(|message| match message {
            ServerMessage::Snapshot { tick, payload } => Some(WorldSnapshot::from_message(*tick, payload)),
            _ => None,
        }) else {
            bail!("{connection} received no initial snapshot");
        };
        let mut sim = Simulation::client(config.clone(), connection, &snapshot?)?;
        for message in messages.iter().filter(|message| !matches!(message, ServerMessage::Snapshot { .. })) {
            sim.receive(message)?;
        }
        clients.push(DemoClient { connection, team, endpoint, sim });
    }

    for client in &mut clients {
        for _ in 0..CLIENT_LEAD_TICKS {
            predict(client, &config)?;
        }
    }

    info!("=== Match ===");
    let mut pacing = tokio::time::interval(Duration::from_micros(1_000_000 / u64::from(config.tick_rate)));
    let mut winner = None;
    let mut resimulated = 0usize;

    for _ in 0..max_ticks {
        if realtime {
            pacing.tick().await;
        }

        for (connection, message) in transport.poll_client_messages() {
            if let Err(err) = server.handle_client_message(connection, message) {
                warn!(%connection, error = %err, "client message rejected");
            }
        }

        let result = server.advance();
        log_events(&result);
        if result.tick.tick_index() % SNAPSHOT_INTERVAL == 0 || result.game_over.is_some() {
            server.broadcast_snapshot()?;
        }
        transport.deliver(server.outbox_mut())?;

        for client in &mut clients {
            for message in client.endpoint.drain()? {
                resimulated += client.sim.receive(&message)?.len();
            }
            if result.game_over.is_none() {
                predict(client, &config)?;
            }
        }

        if let Some(team) = result.game_over {
            winner = Some(team);
            break;
        }
    }

    info!("=== Results ===");
    let server_hash = server.state_hash();
    let last_tick = server.clock().newest_predicted_tick();
    match winner {
        Some(team) => info!(?team, tick = %last_tick, "winner"),
        None => info!(tick = %last_tick, "no winner before the tick limit"),
    }
    info!("Server State Hash: {}", hex::encode(server_hash));
    info!(resimulated, "client passes replayed after snapshots");

    for client in &clients {
        let view = PresentationSnapshot::capture(client.sim.world(), client.sim.clock(), client.sim.config(), Some(client.connection));
        info!(
            connection = %client.connection,
            team = ?client.team,
            confirmed = ?client.sim.last_confirmed(),
            banner = %view.banner(),
            "client view"
        );
    }

    for client in &clients {
        if transport.disconnect(client.connection) {
            server.disconnect(client.connection);
        }
    }

    info!("=== Verifying Determinism ===");
    let record = server.record().context("server keeps a match record")?;
    let replay = Simulation::replay(config, record)?;
    let replay_hash = replay.state_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if server_hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
        Ok(())
    } else {
        bail!("DETERMINISM FAILURE: Hashes differ!")
    }
}

/// Predict one tick on a client and send the input it used.
fn predict(client: &mut DemoClient, config: &SimConfig) -> anyhow::Result<()> {
    let tick = client.sim.next_tick();
    let playing = client.sim.world().session.is_playing();
    let frame = scripted_input(config, client.team, tick, playing);
    client.sim.record_input(client.connection, tick, frame)?;
    client.endpoint.send_input(tick, frame)?;
    let result = client.sim.advance();
    debug!(connection = %client.connection, tick = %result.tick, events = result.events.len(), "predicted");
    Ok(())
}

/// Walk to a spot outside the enemy base's range and bombard it.
///
/// Blue also fires skill shots, so Blue wins the race.
fn scripted_input(config: &SimConfig, team: TeamType, tick: SimulationTick, playing: bool) -> InputFrame {
    let (target_base, standoff) = match team {
        TeamType::Red => (config.npc.blue_base, FixedVec2::from_ints(14, 14)),
        _ => (config.npc.red_base, FixedVec2::from_ints(-14, -14)),
    };
    let mut frame = InputFrame::move_to(target_base + standoff);
    frame.aim = target_base;
    if !playing {
        return frame;
    }

    let index = tick.tick_index();
    frame.set_flag(InputFrame::FLAG_AOE, index % 120 == 0);
    if team == TeamType::Blue {
        frame.set_flag(InputFrame::FLAG_SKILL_SHOT, index % 240 == 60);
        frame.set_flag(InputFrame::FLAG_CONFIRM, index % 240 == 61);
    }
    frame
}

fn log_events(result: &TickResult) {
    for event in &result.events {
        match &event.data {
            GameEventData::CountdownStarted { target_tick } => info!(%target_tick, "countdown started"),
            GameEventData::GameStarted => info!(tick = %event.tick, "game started"),
            GameEventData::EntityDestroyed { entity, kind } => info!(%entity, ?kind, tick = %event.tick, "destroyed"),
            GameEventData::Respawned { connection, champion } => info!(%connection, %champion, "respawned"),
            GameEventData::MinionSpawned { minion, lane, team } => debug!(%minion, ?lane, ?team, "minion spawned"),
            GameEventData::GameOver { winner } => info!(?winner, tick = %event.tick, "game over"),
            _ => {}
        }
    }
}
