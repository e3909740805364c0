#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Maze grid, generation, and reachability for the treasure hunt.
//!
//! A [`MazeGrid`] owns `width × height` cells, each carrying its own set of
//! four walls. Walls are only ever removed in matching pairs so the two cells
//! sharing a side always agree on whether a passage exists. The
//! [`generator`] module carves a spanning tree of passages into a grid and the
//! [`reachability`] module answers breadth-first distance queries over it.

pub mod generator;
pub mod reachability;

pub use generator::generate;
pub use reachability::{distance_map, reachable_within, DistanceMap, UNREACHABLE};

use thiserror::Error;
use treasure_hunt_core::{Position, Wall, WallSet, PLAYER_COUNT};

/// Errors raised while building or generating a maze grid.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The grid would not contain a single cell.
    #[error("maze grid needs at least one cell, got {width}x{height}")]
    Empty {
        /// Requested number of columns.
        width: u32,
        /// Requested number of rows.
        height: u32,
    },
    /// A coarse generation step of zero cells was requested.
    #[error("maze granularity must be at least 1")]
    ZeroGranularity,
}

/// Single maze cell with its own wall flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    position: Position,
    walls: WallSet,
}

impl Cell {
    fn enclosed(position: Position) -> Self {
        Self {
            position,
            walls: WallSet::full(),
        }
    }

    /// Grid coordinate of the cell.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Walls currently standing around the cell.
    #[must_use]
    pub const fn walls(&self) -> WallSet {
        self.walls
    }

    /// Reports whether the wall on the given side is present.
    #[must_use]
    pub const fn has_wall(&self, wall: Wall) -> bool {
        self.walls.contains(wall)
    }

    /// Reports whether all four walls stand, making the cell an impassable pillar.
    #[must_use]
    pub const fn is_solid(&self) -> bool {
        self.walls.is_full()
    }

    /// Reports whether at least one passage leaves the cell.
    #[must_use]
    pub const fn is_path(&self) -> bool {
        !self.is_solid()
    }
}

/// Dense row-major grid of maze cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MazeGrid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl MazeGrid {
    /// Creates a grid with every wall standing.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty { width, height });
        }

        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Cell::enclosed(Position::new(x, y))))
            .collect();

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the position lies inside the grid.
    #[must_use]
    pub const fn is_position_valid(&self, position: Position) -> bool {
        position.x() < self.width && position.y() < self.height
    }

    /// Cell at the provided position, if it lies inside the grid.
    #[must_use]
    pub fn cell(&self, position: Position) -> Option<&Cell> {
        self.index(position).and_then(|index| self.cells.get(index))
    }

    /// Iterator over every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Iterator over every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().map(Cell::position)
    }

    /// Reports whether the wall stands. Positions outside the grid are fully walled.
    #[must_use]
    pub fn has_wall(&self, position: Position, wall: Wall) -> bool {
        self.cell(position).map_or(true, |cell| cell.has_wall(wall))
    }

    /// Removes a wall together with its counterpart on the neighbouring cell.
    ///
    /// Removing a wall that is already gone is a no-op. Walls on the outer
    /// border have no counterpart and are removed on their own.
    pub fn remove_wall(&mut self, position: Position, wall: Wall) {
        if let Some(index) = self.index(position) {
            self.cells[index].walls.remove(wall);
        }

        let neighbor = position.offset(wall, 1).and_then(|next| self.index(next));
        if let Some(index) = neighbor {
            self.cells[index].walls.remove(wall.opposite());
        }
    }

    /// Opens the straight run between two cells sharing a row or column.
    ///
    /// Every wall between `from` and `to` is removed, so non-adjacent cells
    /// are joined through the intermediate cells. Returns `false` without
    /// touching the grid when the cells are equal, out of bounds, or not
    /// aligned.
    pub fn carve_passage(&mut self, from: Position, to: Position) -> bool {
        if from == to || !self.is_position_valid(from) || !self.is_position_valid(to) {
            return false;
        }

        if from.y() == to.y() {
            let row = from.y();
            for x in from.x().min(to.x())..from.x().max(to.x()) {
                self.remove_wall(Position::new(x, row), Wall::Right);
            }
            true
        } else if from.x() == to.x() {
            let column = from.x();
            for y in from.y().min(to.y())..from.y().max(to.y()) {
                self.remove_wall(Position::new(column, y), Wall::Down);
            }
            true
        } else {
            false
        }
    }

    /// Restores every wall.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.walls = WallSet::full();
        }
    }

    /// In-bounds orthogonal neighbours of a position.
    pub fn adjacent(&self, position: Position) -> impl Iterator<Item = Position> + '_ {
        Wall::ALL
            .into_iter()
            .filter_map(move |wall| position.offset(wall, 1))
            .filter(move |neighbor| self.is_position_valid(*neighbor))
    }

    /// Neighbours reachable from a position through an open wall.
    pub fn adjacent_connected(&self, position: Position) -> impl Iterator<Item = Position> + '_ {
        Wall::ALL
            .into_iter()
            .filter(move |wall| !self.has_wall(position, *wall))
            .filter_map(move |wall| position.offset(wall, 1))
            .filter(move |neighbor| self.is_position_valid(*neighbor))
    }

    /// Reports whether two adjacent cells share an open wall.
    #[must_use]
    pub fn are_connected(&self, first: Position, second: Position) -> bool {
        Wall::ALL.into_iter().any(|wall| {
            first.offset(wall, 1) == Some(second)
                && self.is_position_valid(second)
                && !self.has_wall(first, wall)
        })
    }

    /// Number of open passages between adjacent cells.
    #[must_use]
    pub fn passage_count(&self) -> usize {
        self.cells
            .iter()
            .map(|cell| {
                let position = cell.position();
                let right = position.x() + 1 < self.width && !cell.has_wall(Wall::Right);
                let down = position.y() + 1 < self.height && !cell.has_wall(Wall::Down);
                usize::from(right) + usize::from(down)
            })
            .sum()
    }

    /// Sprite index used to draw the cell.
    ///
    /// Path cells use index 0. Solid cells start at 1 and add the wall bit of
    /// every side that borders a path cell.
    #[must_use]
    pub fn tile_image_index(&self, position: Position) -> Option<u8> {
        let cell = self.cell(position)?;
        if cell.is_path() {
            return Some(0);
        }

        let borders = Wall::ALL
            .into_iter()
            .filter(|wall| {
                position
                    .offset(*wall, 1)
                    .and_then(|neighbor| self.cell(neighbor))
                    .is_some_and(Cell::is_path)
            })
            .map(Wall::bit)
            .sum::<u8>();
        Some(1 + borders)
    }

    pub(crate) fn index(&self, position: Position) -> Option<usize> {
        if !self.is_position_valid(position) {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let column = usize::try_from(position.x()).ok()?;
        let row = usize::try_from(position.y()).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

/// Starting cells of the four players: top, right, bottom and left mid-points.
///
/// Anchors are snapped to the coarse lattice used by the generator so they
/// always land on carved cells. A granularity of zero is treated as one.
#[must_use]
pub fn anchor_positions(width: u32, height: u32, granularity: u32) -> [Position; PLAYER_COUNT] {
    let step = granularity.max(1);
    let last_column = width.saturating_sub(1) / step * step;
    let last_row = height.saturating_sub(1) / step * step;
    let middle_column = width / step / 2 * step;
    let middle_row = height / step / 2 * step;

    [
        Position::new(middle_column, 0),
        Position::new(last_column, middle_row),
        Position::new(middle_column, last_row),
        Position::new(0, middle_row),
    ]
}
