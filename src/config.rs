//! Simulation Configuration
//!
//! Resolved once at session start and passed explicitly into every
//! simulation step. Floats never appear here; speeds and positions are
//! Q16.16 and durations are whole ticks, seconds or milliseconds.

use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, to_fixed, from_int};
use crate::core::vec2::FixedVec2;
use crate::game::state::Lane;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`SimConfig`].
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// Values are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Game start rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStartProperties {
    /// Maximum players on one team.
    pub max_players_per_team: u32,
    /// Players required before the countdown starts.
    pub min_players_to_start: u32,
    /// Countdown length in seconds.
    pub countdown_seconds: u32,
}

impl Default for GameStartProperties {
    fn default() -> Self {
        Self {
            max_players_per_team: 2,
            min_players_to_start: 2,
            countdown_seconds: 5,
        }
    }
}

/// Champion template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChampionConfig {
    /// Maximum (and starting) hit points.
    pub max_hit_points: i32,
    /// Movement speed in units per second (Q16.16).
    pub move_speed: Fixed,
    /// Collision radius (Q16.16).
    pub radius: Fixed,
    /// Blue team spawn point.
    pub blue_spawn: FixedVec2,
    /// Red team spawn point.
    pub red_spawn: FixedVec2,
}

impl Default for ChampionConfig {
    fn default() -> Self {
        Self {
            max_hit_points: 100,
            move_speed: from_int(6),
            radius: to_fixed(0.5),
            blue_spawn: FixedVec2::from_ints(-50, -50),
            red_spawn: FixedVec2::from_ints(50, 50),
        }
    }
}

/// Area-of-effect ability template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AoeConfig {
    /// Cooldown in ticks.
    pub cooldown_ticks: u32,
    /// Damage dealt once per receiver.
    pub damage: i32,
    /// Trigger radius (Q16.16).
    pub radius: Fixed,
    /// Lifetime in milliseconds.
    pub lifetime_ms: u32,
}

impl Default for AoeConfig {
    fn default() -> Self {
        Self {
            cooldown_ticks: 100,
            damage: 30,
            radius: from_int(3),
            lifetime_ms: 500,
        }
    }
}

/// Skill shot ability template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillShotConfig {
    /// Cooldown in ticks.
    pub cooldown_ticks: u32,
    /// Damage dealt once per receiver.
    pub damage: i32,
    /// Trigger radius (Q16.16).
    pub radius: Fixed,
    /// Travel speed in units per second (Q16.16).
    pub speed: Fixed,
    /// Lifetime in milliseconds.
    pub lifetime_ms: u32,
}

impl Default for SkillShotConfig {
    fn default() -> Self {
        Self {
            cooldown_ticks: 180,
            damage: 45,
            radius: to_fixed(0.75),
            speed: from_int(20),
            lifetime_ms: 1500,
        }
    }
}

/// Structure (base / tower) and NPC attack template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    /// Base hit points.
    pub base_hit_points: i32,
    /// Base collision radius (Q16.16).
    pub base_radius: Fixed,
    /// Blue base position.
    pub blue_base: FixedVec2,
    /// Red base position.
    pub red_base: FixedVec2,
    /// Ticks between NPC attacks.
    pub attack_cooldown_ticks: u32,
    /// Target acquisition radius (Q16.16).
    pub target_radius: Fixed,
    /// Projectile damage.
    pub projectile_damage: i32,
    /// Projectile speed in units per second (Q16.16).
    pub projectile_speed: Fixed,
    /// Projectile radius (Q16.16).
    pub projectile_radius: Fixed,
    /// Projectile lifetime in milliseconds.
    pub projectile_lifetime_ms: u32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            base_hit_points: 400,
            base_radius: from_int(3),
            blue_base: FixedVec2::from_ints(-60, -60),
            red_base: FixedVec2::from_ints(60, 60),
            attack_cooldown_ticks: 90,
            target_radius: from_int(12),
            projectile_damage: 10,
            projectile_speed: from_int(25),
            projectile_radius: to_fixed(0.4),
            projectile_lifetime_ms: 1000,
        }
    }
}

/// Minion waves and the lane table.
///
/// Lanes run from the blue side to the red side; red minions walk them
/// backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinionConfig {
    /// Minions per lane and team in one wave; 0 disables waves.
    pub count_per_wave: u32,
    /// Ticks from the end of one wave to the start of the next. The first
    /// wave also waits this long after the game starts.
    pub wave_interval_ticks: u32,
    /// Ticks between minions of the same wave.
    pub spawn_interval_ticks: u32,
    /// Minion hit points.
    pub max_hit_points: i32,
    /// Movement speed in units per second (Q16.16).
    pub move_speed: Fixed,
    /// Collision radius (Q16.16).
    pub radius: Fixed,
    /// Distance at which a waypoint counts as reached (Q16.16).
    pub waypoint_radius: Fixed,
    /// Target acquisition radius (Q16.16).
    pub target_radius: Fixed,
    /// Ticks between minion attacks.
    pub attack_cooldown_ticks: u32,
    /// Top lane waypoints.
    pub top_lane: Vec<FixedVec2>,
    /// Middle lane waypoints.
    pub mid_lane: Vec<FixedVec2>,
    /// Bottom lane waypoints.
    pub bot_lane: Vec<FixedVec2>,
}

impl MinionConfig {
    /// Waypoints of `lane`.
    pub fn lane(&self, lane: Lane) -> &[FixedVec2] {
        match lane {
            Lane::Top => &self.top_lane,
            Lane::Mid => &self.mid_lane,
            Lane::Bot => &self.bot_lane,
        }
    }
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            count_per_wave: 3,
            wave_interval_ticks: 1200,
            spawn_interval_ticks: 60,
            max_hit_points: 60,
            move_speed: from_int(3),
            radius: to_fixed(0.5),
            waypoint_radius: to_fixed(1.5),
            target_radius: from_int(8),
            attack_cooldown_ticks: 60,
            top_lane: vec![
                FixedVec2::from_ints(-60, -52),
                FixedVec2::from_ints(-60, 60),
                FixedVec2::from_ints(52, 60),
            ],
            mid_lane: vec![FixedVec2::from_ints(-54, -54), FixedVec2::from_ints(54, 54)],
            bot_lane: vec![
                FixedVec2::from_ints(-52, -60),
                FixedVec2::from_ints(60, -60),
                FixedVec2::from_ints(60, 52),
            ],
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Ticks kept in every tick history (maximum rollback depth).
    pub history_window_ticks: u32,
    /// Maximum ticks resimulated in one batch.
    pub max_resimulation_batch: u32,
    /// Delay between a champion's destruction and its respawn.
    pub respawn_delay_ticks: u32,
    /// Where clients park destroyed entities until removal is confirmed.
    pub out_of_world_position: FixedVec2,
    /// Game start rules.
    pub session: GameStartProperties,
    /// Champion template.
    pub champion: ChampionConfig,
    /// AOE ability template.
    pub aoe: AoeConfig,
    /// Skill shot template.
    pub skill_shot: SkillShotConfig,
    /// Structure / NPC template.
    pub npc: NpcConfig,
    /// Minion waves.
    pub minion: MinionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            history_window_ticks: crate::core::history::DEFAULT_HISTORY_WINDOW,
            max_resimulation_batch: 8,
            respawn_delay_ticks: 150,
            out_of_world_position: FixedVec2::from_ints(1000, 1000),
            session: GameStartProperties::default(),
            champion: ChampionConfig::default(),
            aoe: AoeConfig::default(),
            skill_shot: SkillShotConfig::default(),
            npc: NpcConfig::default(),
            minion: MinionConfig::default(),
        }
    }
}

impl SimConfig {
    /// Defaults with `LANE_CLASH_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LANE_CLASH_*` overrides to this config.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        override_u32("LANE_CLASH_TICK_RATE", &mut self.tick_rate)?;
        override_u32("LANE_CLASH_HISTORY_WINDOW", &mut self.history_window_ticks)?;
        override_u32("LANE_CLASH_MAX_RESIM_BATCH", &mut self.max_resimulation_batch)?;
        override_u32("LANE_CLASH_RESPAWN_DELAY_TICKS", &mut self.respawn_delay_ticks)?;
        override_u32("LANE_CLASH_MIN_PLAYERS", &mut self.session.min_players_to_start)?;
        override_u32("LANE_CLASH_MAX_PLAYERS_PER_TEAM", &mut self.session.max_players_per_team)?;
        override_u32("LANE_CLASH_COUNTDOWN_SECONDS", &mut self.session.countdown_seconds)?;
        override_u32("LANE_CLASH_MINIONS_PER_WAVE", &mut self.minion.count_per_wave)?;
        Ok(())
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.history_window_ticks == 0 {
            return Err(ConfigError::Invalid("history_window_ticks must be positive".into()));
        }
        if self.max_resimulation_batch == 0 || self.max_resimulation_batch > self.history_window_ticks {
            return Err(ConfigError::Invalid(format!(
                "max_resimulation_batch must be in 1..={}",
                self.history_window_ticks
            )));
        }
        if self.respawn_delay_ticks == 0 {
            return Err(ConfigError::Invalid("respawn_delay_ticks must be positive".into()));
        }
        if self.session.max_players_per_team == 0 {
            return Err(ConfigError::Invalid("max_players_per_team must be positive".into()));
        }
        if self.session.min_players_to_start > self.session.max_players_per_team * 2 {
            return Err(ConfigError::Invalid(
                "min_players_to_start exceeds both rosters combined".into(),
            ));
        }
        if self.minion.count_per_wave > 0 {
            if self.minion.wave_interval_ticks == 0 || self.minion.spawn_interval_ticks == 0 {
                return Err(ConfigError::Invalid("minion wave intervals must be positive".into()));
            }
            if Lane::ALL.iter().any(|lane| self.minion.lane(*lane).is_empty()) {
                return Err(ConfigError::Invalid("every lane needs at least one waypoint".into()));
            }
        }
        Ok(())
    }

    /// Convert milliseconds to whole ticks (truncating).
    pub fn millis_to_ticks(&self, millis: u32) -> u32 {
        ((millis as u64 * self.tick_rate as u64) / 1000) as u32
    }

    /// Convert whole seconds to ticks.
    pub fn seconds_to_ticks(&self, seconds: u32) -> u32 {
        seconds.saturating_mul(self.tick_rate)
    }

    /// Per-tick step for a per-second speed.
    pub fn per_tick(&self, per_second: Fixed) -> Fixed {
        per_second / self.tick_rate as Fixed
    }
}

fn override_u32(key: &'static str, slot: &mut u32) -> Result<(), ConfigError> {
    match std::env::var(key) {
        Ok(value) => {
            *slot = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value })?;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}
