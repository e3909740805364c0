//! Randomized growing-tree maze generation.
//!
//! The generator keeps a list of active cells. Each iteration picks either the
//! most recently added cell or, one time in [`BREADTH_PICK_ODDS`], a uniformly
//! random one. Mixing the two keeps long corridors while still branching often
//! enough to avoid the single winding path of a pure depth-first carve.

use rand::Rng;
use treasure_hunt_core::{Position, Wall};

use crate::{GridError, MazeGrid};

/// One pick in this many selects a random active cell instead of the newest one.
pub const BREADTH_PICK_ODDS: u32 = 4;

/// Carves a spanning tree of passages into `grid`.
///
/// Every wall is restored first. With `granularity > 1` the tree spans only
/// the cells whose coordinates are multiples of `granularity`; the straight
/// runs between them are opened and every other cell stays solid.
pub fn generate<R>(grid: &mut MazeGrid, granularity: u32, rng: &mut R) -> Result<(), GridError>
where
    R: Rng,
{
    if granularity == 0 {
        return Err(GridError::ZeroGranularity);
    }

    grid.reset();

    let mut visited = vec![false; grid.cell_count()];
    let start = random_lattice_position(grid, granularity, rng);
    mark_visited(grid, &mut visited, start);

    let mut active = vec![start];
    let mut unvisited = Vec::with_capacity(Wall::ALL.len());

    while !active.is_empty() {
        let index = choose_active_index(active.len(), rng);
        let cell = active[index];

        unvisited.clear();
        unvisited.extend(
            lattice_neighbors(grid, cell, granularity)
                .filter(|neighbor| !is_visited(grid, &visited, *neighbor)),
        );

        if unvisited.is_empty() {
            let _ = active.remove(index);
            continue;
        }

        let next = unvisited[rng.gen_range(0..unvisited.len())];
        let _ = grid.carve_passage(cell, next);
        mark_visited(grid, &mut visited, next);
        active.push(next);
    }

    Ok(())
}

fn choose_active_index<R: Rng>(len: usize, rng: &mut R) -> usize {
    if rng.gen_range(0..BREADTH_PICK_ODDS) == 0 {
        rng.gen_range(0..len)
    } else {
        len - 1
    }
}

fn random_lattice_position<R: Rng>(grid: &MazeGrid, granularity: u32, rng: &mut R) -> Position {
    let columns = grid.width().div_ceil(granularity);
    let rows = grid.height().div_ceil(granularity);
    Position::new(
        rng.gen_range(0..columns) * granularity,
        rng.gen_range(0..rows) * granularity,
    )
}

fn lattice_neighbors(
    grid: &MazeGrid,
    position: Position,
    granularity: u32,
) -> impl Iterator<Item = Position> + '_ {
    Wall::ALL
        .into_iter()
        .filter_map(move |wall| position.offset(wall, granularity))
        .filter(move |neighbor| grid.is_position_valid(*neighbor))
}

fn is_visited(grid: &MazeGrid, visited: &[bool], position: Position) -> bool {
    grid.index(position)
        .and_then(|index| visited.get(index).copied())
        .unwrap_or(true)
}

fn mark_visited(grid: &MazeGrid, visited: &mut [bool], position: Position) {
    if let Some(slot) = grid.index(position).and_then(|index| visited.get_mut(index)) {
        *slot = true;
    }
}
