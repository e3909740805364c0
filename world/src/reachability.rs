//! Breadth-first reachability over the open-passage graph.

use std::collections::VecDeque;

use treasure_hunt_core::Position;

use crate::MazeGrid;

/// Distance recorded for cells the search never reached.
pub const UNREACHABLE: u32 = u32::MAX;

/// Dense hop-count grid produced by a breadth-first search from one origin.
///
/// The map mirrors the maze dimensions and stores distances in row-major
/// order. Cells the search did not reach keep [`UNREACHABLE`] so callers can
/// tell pillars and cut-off regions from traversable cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceMap {
    width: u32,
    height: u32,
    distances: Vec<u32>,
}

impl DistanceMap {
    fn unreached(grid: &MazeGrid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            distances: vec![UNREACHABLE; grid.cell_count()],
        }
    }

    /// Width of the map in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the map in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw distances stored in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[u32] {
        &self.distances
    }

    /// Hop count to the provided cell, if the search reached it.
    #[must_use]
    pub fn distance(&self, position: Position) -> Option<u32> {
        self.offset(position)
            .and_then(|offset| self.distances.get(offset).copied())
            .filter(|distance| *distance != UNREACHABLE)
    }

    /// Reports whether the search reached the cell.
    #[must_use]
    pub fn is_reachable(&self, position: Position) -> bool {
        self.distance(position).is_some()
    }

    /// Number of cells the search reached.
    #[must_use]
    pub fn reachable_count(&self) -> usize {
        self.distances
            .iter()
            .filter(|distance| **distance != UNREACHABLE)
            .count()
    }

    fn offset(&self, position: Position) -> Option<usize> {
        if position.x() >= self.width || position.y() >= self.height {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let column = usize::try_from(position.x()).ok()?;
        let row = usize::try_from(position.y()).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

/// Computes the hop count from `origin` to every cell connected to it.
///
/// An origin outside the grid yields a map where every cell is unreachable.
#[must_use]
pub fn distance_map(grid: &MazeGrid, origin: Position) -> DistanceMap {
    let (map, _) = search(grid, origin, None);
    map
}

/// Cells whose shortest open-passage distance from `origin` is at most `max_distance`.
///
/// The origin itself is included at distance zero. Cells are returned in
/// breadth-first order, nearest first.
#[must_use]
pub fn reachable_within(grid: &MazeGrid, origin: Position, max_distance: u32) -> Vec<Position> {
    let (_, visited) = search(grid, origin, Some(max_distance));
    visited
}

fn search(grid: &MazeGrid, origin: Position, limit: Option<u32>) -> (DistanceMap, Vec<Position>) {
    let mut map = DistanceMap::unreached(grid);
    let mut visited = Vec::new();

    let Some(origin_index) = grid.index(origin) else {
        return (map, visited);
    };

    map.distances[origin_index] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(origin);

    while let Some(position) = queue.pop_front() {
        let Some(current_index) = grid.index(position) else {
            continue;
        };
        let current_distance = map.distances[current_index];
        visited.push(position);

        if limit.is_some_and(|limit| current_distance >= limit) {
            continue;
        }

        let next_distance = current_distance.saturating_add(1);
        for neighbor in grid.adjacent_connected(position) {
            let Some(neighbor_index) = grid.index(neighbor) else {
                continue;
            };

            if map.distances[neighbor_index] != UNREACHABLE {
                continue;
            }

            map.distances[neighbor_index] = next_distance;
            queue.push_back(neighbor);
        }
    }

    (map, visited)
}
