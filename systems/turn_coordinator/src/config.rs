//! Configuration of the turn coordinator.

use std::time::Duration;

use thiserror::Error;
use treasure_hunt_core::{AreaId, BoardResolution, TreasureScoring};
use treasure_hunt_world::{anchor_positions, MazeGrid};

/// Cells a confirmed piece may move per turn.
pub const DEFAULT_REACH_DISTANCE: u32 = 3;
/// Cells a piece may stray from its anchor while it is being placed.
pub const DEFAULT_INITIAL_REACH_DISTANCE: u32 = 5;
/// Extra cells watched around a piece to tolerate imprecise placement.
pub const DEFAULT_PLACEMENT_TOLERANCE: u32 = 2;

/// Delays between the coordinator's visible steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// Time given to a fresh maze before placement begins.
    pub settle: Duration,
    /// Delay between entering placement and issuing the placement watches.
    pub placement_watch: Duration,
    /// Delay between confirming a piece and watching it for movement.
    pub placement_rewatch: Duration,
    /// Delay between the start of a turn and watching the current piece.
    pub turn_watch: Duration,
    /// Delay between the first confirmed piece and revealing the treasure.
    pub treasure_reveal: Duration,
    /// Delay between finding the treasure and clearing the board.
    pub board_clear: Duration,
    /// Delay between finding the treasure and starting the next round.
    pub restart: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1_500),
            placement_watch: Duration::from_millis(2_500),
            placement_rewatch: Duration::from_millis(1_500),
            turn_watch: Duration::from_millis(2_000),
            treasure_reveal: Duration::from_millis(1_000),
            board_clear: Duration::from_millis(4_000),
            restart: Duration::from_millis(7_000),
        }
    }
}

impl Pacing {
    /// Pacing without any delay, useful for headless hosts.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            placement_watch: Duration::ZERO,
            placement_rewatch: Duration::ZERO,
            turn_watch: Duration::ZERO,
            treasure_reveal: Duration::ZERO,
            board_clear: Duration::ZERO,
            restart: Duration::ZERO,
        }
    }
}

/// Tunable parameters of a match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Coarse carving step used by the maze generator.
    pub granularity: u32,
    /// Movement budget of a confirmed piece, in cells per turn.
    pub reach_distance: u32,
    /// Movement budget of a piece that is still being placed.
    pub initial_reach_distance: u32,
    /// Extra cells added around the reach when watching for initial placement.
    pub placement_tolerance: u32,
    /// Tiled board area every watch applies to.
    pub area: AreaId,
    /// Camera resolution requested when the board is reset.
    pub resolution: Option<BoardResolution>,
    /// Formula used to place the treasure.
    pub scoring: TreasureScoring,
    /// Delays between visible steps.
    pub pacing: Pacing,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            granularity: 1,
            reach_distance: DEFAULT_REACH_DISTANCE,
            initial_reach_distance: DEFAULT_INITIAL_REACH_DISTANCE,
            placement_tolerance: DEFAULT_PLACEMENT_TOLERANCE,
            area: AreaId::new(0),
            resolution: None,
            scoring: TreasureScoring::default(),
            pacing: Pacing::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Checks the configuration against the maze it will drive.
    pub fn validate(&self, maze: &MazeGrid) -> Result<(), ConfigError> {
        if self.granularity == 0 {
            return Err(ConfigError::ZeroGranularity);
        }

        if self.reach_distance == 0 {
            return Err(ConfigError::ZeroReachDistance);
        }

        if self.initial_reach_distance < self.reach_distance {
            return Err(ConfigError::InitialReachBelowSteady {
                initial: self.initial_reach_distance,
                steady: self.reach_distance,
            });
        }

        let anchors = anchor_positions(maze.width(), maze.height(), self.granularity);
        let overlapping = anchors
            .iter()
            .enumerate()
            .any(|(index, anchor)| anchors[index + 1..].contains(anchor));
        if overlapping {
            return Err(ConfigError::BoardTooSmall {
                width: maze.width(),
                height: maze.height(),
                granularity: self.granularity,
            });
        }

        Ok(())
    }
}

/// Reasons a configuration cannot drive a match.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The generator needs a step of at least one cell.
    #[error("granularity must be at least 1")]
    ZeroGranularity,
    /// Pieces could never move.
    #[error("reach distance must be at least 1")]
    ZeroReachDistance,
    /// Placement must tolerate at least the steady-state reach.
    #[error("initial reach distance {initial} is below the steady reach distance {steady}")]
    InitialReachBelowSteady {
        /// Configured initial reach.
        initial: u32,
        /// Configured steady-state reach.
        steady: u32,
    },
    /// Two players would share an anchor cell.
    #[error("a {width}x{height} board at granularity {granularity} cannot seat four players")]
    BoardTooSmall {
        /// Maze width in cells.
        width: u32,
        /// Maze height in cells.
        height: u32,
        /// Configured granularity.
        granularity: u32,
    },
}
