//! Command-line flags layered over an optional TOML settings file.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use treasure_hunt_core::{AreaId, BoardResolution, TreasureScoring};
use treasure_hunt_system_turn_coordinator::{
    CoordinatorConfig, Pacing, DEFAULT_INITIAL_REACH_DISTANCE, DEFAULT_PLACEMENT_TOLERANCE,
    DEFAULT_REACH_DISTANCE,
};

/// Plays treasure hunt rounds against a simulated camera board.
#[derive(Debug, Parser)]
#[command(name = "treasure-hunt", version)]
pub(crate) struct Args {
    /// TOML file supplying defaults for every other flag.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Seed for maze generation and the simulated players.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Maze width in cells.
    #[arg(long)]
    pub(crate) width: Option<u32>,
    /// Maze height in cells.
    #[arg(long)]
    pub(crate) height: Option<u32>,
    /// Coarse carving step of the maze generator.
    #[arg(long)]
    pub(crate) granularity: Option<u32>,
    /// Number of rounds to play before exiting.
    #[arg(long)]
    pub(crate) rounds: Option<u32>,
    /// Upper bound on processed inputs.
    #[arg(long)]
    pub(crate) max_steps: Option<usize>,
    /// Treasure placement formula.
    #[arg(long, value_enum)]
    pub(crate) scoring: Option<ScoringArg>,
    /// Emit requests, reports, timers and events as JSON lines.
    #[arg(long)]
    pub(crate) json: bool,
}

/// Command-line spelling of [`TreasureScoring`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ScoringArg {
    /// Maximise `sum(distance²) * min(distance)`.
    FairSpread,
    /// Minimise `max(distance)²`.
    MinimaxDistance,
}

impl From<ScoringArg> for TreasureScoring {
    fn from(value: ScoringArg) -> Self {
        match value {
            ScoringArg::FairSpread => Self::FairSpread,
            ScoringArg::MinimaxDistance => Self::MinimaxDistance,
        }
    }
}

/// How the simulated players and camera misbehave.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SimulationConfig {
    /// Chance a piece is first put down next to its anchor.
    pub(crate) misplace: f64,
    /// Chance a report is delivered twice.
    pub(crate) duplicate: f64,
    /// Chance the last report is delivered again after its watch was cancelled.
    pub(crate) stale: f64,
    /// Chance a player never puts its piece down.
    pub(crate) absent: f64,
    /// Chance a player heads straight for the treasure instead of wandering.
    pub(crate) greedy: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            misplace: 0.15,
            duplicate: 0.1,
            stale: 0.1,
            absent: 0.05,
            greedy: 0.6,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("misplace", self.misplace),
            ("duplicate", self.duplicate),
            ("stale", self.stale),
            ("absent", self.absent),
            ("greedy", self.greedy),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "simulation.{name} must be a probability, got {value}"
            );
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PacingFile {
    settle_ms: u64,
    placement_watch_ms: u64,
    placement_rewatch_ms: u64,
    turn_watch_ms: u64,
    treasure_reveal_ms: u64,
    board_clear_ms: u64,
    restart_ms: u64,
}

impl Default for PacingFile {
    fn default() -> Self {
        let pacing = Pacing::default();
        Self {
            settle_ms: millis(pacing.settle),
            placement_watch_ms: millis(pacing.placement_watch),
            placement_rewatch_ms: millis(pacing.placement_rewatch),
            turn_watch_ms: millis(pacing.turn_watch),
            treasure_reveal_ms: millis(pacing.treasure_reveal),
            board_clear_ms: millis(pacing.board_clear),
            restart_ms: millis(pacing.restart),
        }
    }
}

impl From<PacingFile> for Pacing {
    fn from(value: PacingFile) -> Self {
        Self {
            settle: Duration::from_millis(value.settle_ms),
            placement_watch: Duration::from_millis(value.placement_watch_ms),
            placement_rewatch: Duration::from_millis(value.placement_rewatch_ms),
            turn_watch: Duration::from_millis(value.turn_watch_ms),
            treasure_reveal: Duration::from_millis(value.treasure_reveal_ms),
            board_clear: Duration::from_millis(value.board_clear_ms),
            restart: Duration::from_millis(value.restart_ms),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    seed: u64,
    width: u32,
    height: u32,
    granularity: u32,
    rounds: u32,
    max_steps: usize,
    reach_distance: u32,
    initial_reach_distance: u32,
    placement_tolerance: u32,
    area: u32,
    resolution: Option<BoardResolution>,
    scoring: TreasureScoring,
    pacing: PacingFile,
    simulation: SimulationConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 39,
            height: 25,
            granularity: 1,
            rounds: 1,
            max_steps: 100_000,
            reach_distance: DEFAULT_REACH_DISTANCE,
            initial_reach_distance: DEFAULT_INITIAL_REACH_DISTANCE,
            placement_tolerance: DEFAULT_PLACEMENT_TOLERANCE,
            area: 0,
            resolution: None,
            scoring: TreasureScoring::default(),
            pacing: PacingFile::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Fully resolved settings of a headless run.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub(crate) seed: u64,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rounds: u32,
    pub(crate) max_steps: usize,
    pub(crate) json: bool,
    pub(crate) coordinator: CoordinatorConfig,
    pub(crate) simulation: SimulationConfig,
}

impl Settings {
    /// Reads the settings file named by `args`, if any, and applies the flag overrides.
    pub(crate) fn load(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings at {}", path.display()))?;
                parse_file(&contents)
                    .with_context(|| format!("failed to parse settings at {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        Self::resolve(file, args)
    }

    fn resolve(file: FileConfig, args: &Args) -> Result<Self> {
        file.simulation.validate()?;
        ensure!(
            args.rounds.unwrap_or(file.rounds) > 0,
            "at least one round must be played"
        );

        let coordinator = CoordinatorConfig {
            granularity: args.granularity.unwrap_or(file.granularity),
            reach_distance: file.reach_distance,
            initial_reach_distance: file.initial_reach_distance,
            placement_tolerance: file.placement_tolerance,
            area: AreaId::new(file.area),
            resolution: file.resolution,
            scoring: args.scoring.map_or(file.scoring, TreasureScoring::from),
            pacing: file.pacing.into(),
        };

        Ok(Self {
            seed: args.seed.unwrap_or(file.seed),
            width: args.width.unwrap_or(file.width),
            height: args.height.unwrap_or(file.height),
            rounds: args.rounds.unwrap_or(file.rounds),
            max_steps: args.max_steps.unwrap_or(file.max_steps),
            json: args.json,
            coordinator,
            simulation: file.simulation,
        })
    }
}

fn parse_file(contents: &str) -> Result<FileConfig> {
    toml::from_str(contents).context("failed to parse settings toml contents")
}
