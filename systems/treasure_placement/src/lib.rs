#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Treasure placement system that picks the fairest cell for the treasure.
//!
//! Every player's distance map is computed from its starting cell. A cell is
//! a candidate only when every map reaches it. Candidates are ranked by the
//! configured [`TreasureScoring`] in a single row-major scan and the first
//! best-ranked cell wins.

use log::debug;
use treasure_hunt_core::{Position, TreasureScoring};
use treasure_hunt_world::{distance_map, DistanceMap, MazeGrid};

/// Per-player distance summary of a candidate cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellScore {
    /// Candidate cell.
    pub position: Position,
    /// Distance from the nearest player.
    pub min_distance: u32,
    /// Distance from the farthest player.
    pub max_distance: u32,
    /// Sum over players of the squared distance.
    pub summed_squares: u64,
}

impl CellScore {
    /// Numeric rank of the cell under the provided policy.
    ///
    /// `FairSpread` ranks are maximised, `MinimaxDistance` ranks are minimised.
    #[must_use]
    pub fn rank(&self, scoring: TreasureScoring) -> u64 {
        match scoring {
            TreasureScoring::FairSpread => {
                self.summed_squares.saturating_mul(u64::from(self.min_distance))
            }
            TreasureScoring::MinimaxDistance => {
                let max = u64::from(self.max_distance);
                max.saturating_mul(max)
            }
        }
    }

    fn improves_on(&self, best: &CellScore, scoring: TreasureScoring) -> bool {
        match scoring {
            TreasureScoring::FairSpread => self.rank(scoring) > best.rank(scoring),
            TreasureScoring::MinimaxDistance => self.rank(scoring) < best.rank(scoring),
        }
    }
}

/// Summarises the distances from every map to `position`.
///
/// Returns `None` when any map failed to reach the cell or no maps are given.
#[must_use]
pub fn score_cell(maps: &[DistanceMap], position: Position) -> Option<CellScore> {
    let mut distances = maps.iter().map(|map| map.distance(position));
    let first = distances.next()??;

    let mut score = CellScore {
        position,
        min_distance: first,
        max_distance: first,
        summed_squares: u64::from(first) * u64::from(first),
    };

    for distance in distances {
        let distance = distance?;
        score.min_distance = score.min_distance.min(distance);
        score.max_distance = score.max_distance.max(distance);
        score.summed_squares = score
            .summed_squares
            .saturating_add(u64::from(distance) * u64::from(distance));
    }

    Some(score)
}

/// Pure system that chooses the treasure cell for a freshly generated maze.
#[derive(Debug)]
pub struct TreasurePlacement {
    scoring: TreasureScoring,
    maps: Vec<DistanceMap>,
}

impl Default for TreasurePlacement {
    fn default() -> Self {
        Self::new(TreasureScoring::default())
    }
}

impl TreasurePlacement {
    /// Creates a placement system using the provided scoring policy.
    #[must_use]
    pub const fn new(scoring: TreasureScoring) -> Self {
        Self {
            scoring,
            maps: Vec::new(),
        }
    }

    /// Selects the treasure cell for players starting at `origins`.
    ///
    /// Returns `None` when no cell is reachable by every player.
    pub fn place(&mut self, grid: &MazeGrid, origins: &[Position]) -> Option<CellScore> {
        self.maps.clear();
        self.maps
            .extend(origins.iter().map(|origin| distance_map(grid, *origin)));

        let mut best: Option<CellScore> = None;
        for position in grid.positions() {
            let Some(candidate) = score_cell(&self.maps, position) else {
                continue;
            };

            let replace = match &best {
                Some(current) => candidate.improves_on(current, self.scoring),
                None => true,
            };
            if replace {
                best = Some(candidate);
            }
        }

        if let Some(choice) = &best {
            debug!(
                "treasure placed at ({}, {}) with rank {} under {:?}",
                choice.position.x(),
                choice.position.y(),
                choice.rank(self.scoring),
                self.scoring,
            );
        }

        best
    }

    /// Distance maps computed by the most recent [`TreasurePlacement::place`] call.
    #[must_use]
    pub fn distance_maps(&self) -> &[DistanceMap] {
        &self.maps
    }
}
