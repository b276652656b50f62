/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing, unreadable or invalid.
///
/// ```toml
/// [race]
/// tick_speed = 50
/// team_mode = "mandatory"
///
/// [tuning]
/// gravity = 0.5
///
/// [[tune_zone]]
/// zone = 1
/// gravity = 0.25      # everything else inherits [tuning]
/// ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::physics::Tuning;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct RaceConfig {
    pub tick_speed: i32,
    /// Seconds applied by freeze tiles and by deep freeze.
    pub freeze_delay: i32,
    pub team_mode: TeamMode,
    pub teleport_hold_hook: bool,
    pub teleport_lose_weapons: bool,
    pub rescue: bool,
    pub rescue_delay: i32,
    /// Strip shotgun/grenade/laser when a run starts.
    pub reset_pickups: bool,
    /// Endless hook for freshly spawned characters.
    pub endless_hook: bool,
    pub rng_seed: Option<u64>,
    pub tuning: Tuning,
    pub tune_zones: BTreeMap<u8, Tuning>,
    pub run: RunConfig,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamMode {
    /// Teams are allowed; solo runs too.
    #[default]
    Optional,
    /// A run may only start inside a team with at least two members.
    Mandatory,
    /// No teams; a started run cannot restart on a start tile.
    Solo,
}

/// Settings used only by the headless runner.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub map: Option<PathBuf>,
    pub ticks: u64,
    pub characters: usize,
}

impl RaceConfig {
    /// Physics tuning for a tune zone; zone 0 and unknown zones use the base.
    pub fn tuning_for(&self, zone: u8) -> &Tuning {
        self.tune_zones.get(&zone).unwrap_or(&self.tuning)
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    race: TomlRace,
    #[serde(default)]
    tuning: toml::Table,
    #[serde(default)]
    tune_zone: Vec<toml::Table>,
    #[serde(default)]
    run: TomlRun,
}

#[derive(Deserialize, Debug)]
struct TomlRace {
    #[serde(default = "default_tick_speed")]
    tick_speed: i32,
    #[serde(default = "default_freeze_delay")]
    freeze_delay: i32,
    #[serde(default)]
    team_mode: TeamMode,
    #[serde(default)]
    teleport_hold_hook: bool,
    #[serde(default)]
    teleport_lose_weapons: bool,
    #[serde(default)]
    rescue: bool,
    #[serde(default = "default_rescue_delay")]
    rescue_delay: i32,
    #[serde(default)]
    reset_pickups: bool,
    #[serde(default)]
    endless_hook: bool,
    #[serde(default)]
    rng_seed: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct TomlRun {
    #[serde(default)]
    map: Option<String>,
    #[serde(default = "default_ticks")]
    ticks: u64,
    #[serde(default = "default_characters")]
    characters: usize,
}

// ── Defaults ──

fn default_tick_speed() -> i32 { 50 }
fn default_freeze_delay() -> i32 { 3 }
fn default_rescue_delay() -> i32 { 1 }
fn default_ticks() -> u64 { 500 }
fn default_characters() -> usize { 1 }

impl Default for TomlRace {
    fn default() -> Self {
        TomlRace {
            tick_speed: default_tick_speed(),
            freeze_delay: default_freeze_delay(),
            team_mode: TeamMode::default(),
            teleport_hold_hook: false,
            teleport_lose_weapons: false,
            rescue: false,
            rescue_delay: default_rescue_delay(),
            reset_pickups: false,
            endless_hook: false,
            rng_seed: None,
        }
    }
}

impl Default for TomlRun {
    fn default() -> Self {
        TomlRun { map: None, ticks: default_ticks(), characters: default_characters() }
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig::assemble(TomlRace::default(), TomlRun::default(), Tuning::default(), BTreeMap::new())
    }
}

// ── Loading ──

impl RaceConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        for dir in &search_dirs {
            let path = dir.join("config.toml");
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => match RaceConfig::from_toml_str(&text) {
                    Ok(cfg) => {
                        log::info!("loaded {}", path.display());
                        return cfg;
                    }
                    Err(e) => {
                        log::warn!("config.toml parse error: {e}; using default settings");
                        return RaceConfig::default();
                    }
                },
                Err(e) => log::warn!("could not read {}: {e}", path.display()),
            }
        }
        RaceConfig::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let raw: TomlConfig = toml::from_str(text)?;
        RaceConfig::from_toml(raw)
    }

    fn from_toml(raw: TomlConfig) -> Result<Self, toml::de::Error> {
        let tuning: Tuning = toml::Value::Table(raw.tuning.clone()).try_into()?;

        let mut tune_zones = BTreeMap::new();
        for mut zone_table in raw.tune_zone {
            let zone = match zone_table.remove("zone").and_then(|v| v.as_integer()) {
                Some(z) if (1..=255).contains(&z) => z as u8,
                other => {
                    log::warn!("ignoring [[tune_zone]] with invalid zone {other:?}");
                    continue;
                }
            };
            let mut merged = raw.tuning.clone();
            merged.extend(zone_table);
            tune_zones.insert(zone, toml::Value::Table(merged).try_into()?);
        }

        Ok(RaceConfig::assemble(raw.race, raw.run, tuning, tune_zones))
    }

    fn assemble(race: TomlRace, run: TomlRun, tuning: Tuning, tune_zones: BTreeMap<u8, Tuning>) -> Self {
        if race.tick_speed <= 0 {
            log::warn!("tick_speed {} is not positive, using {}", race.tick_speed, default_tick_speed());
        }
        RaceConfig {
            tick_speed: if race.tick_speed > 0 { race.tick_speed } else { default_tick_speed() },
            freeze_delay: race.freeze_delay,
            team_mode: race.team_mode,
            teleport_hold_hook: race.teleport_hold_hook,
            teleport_lose_weapons: race.teleport_lose_weapons,
            rescue: race.rescue,
            rescue_delay: race.rescue_delay,
            reset_pickups: race.reset_pickups,
            endless_hook: race.endless_hook,
            rng_seed: race.rng_seed,
            tuning,
            tune_zones,
            run: RunConfig {
                map: run.map.map(|m| resolve_path(&m, &candidate_dirs())),
                ticks: run.ticks,
                characters: run.characters,
            },
        }
    }
}

/// Relative paths are looked up in the candidate directories, falling
/// back to the CWD.
fn resolve_path(name: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = PathBuf::from(name);
    if path.is_absolute() {
        return path;
    }
    search_dirs
        .iter()
        .map(|d| d.join(name))
        .find(|p| p.exists())
        .unwrap_or(path)
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }
    dirs
}
