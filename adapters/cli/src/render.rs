//! ASCII rendering of the board.

use treasure_hunt_core::{PlayerState, Position, Wall};
use treasure_hunt_system_turn_coordinator::Player;
use treasure_hunt_world::MazeGrid;

const WALL: char = '#';
const FLOOR: char = ' ';
const TREASURE: char = '$';

/// Draws the maze with a one-character border around every cell.
///
/// Pieces of players still in the round are drawn as their seat digit and the
/// treasure, once revealed, as `$`.
pub(crate) fn render_board(
    maze: &MazeGrid,
    players: &[Player],
    treasure: Option<Position>,
) -> String {
    let columns = maze.width() as usize * 2 + 1;
    let rows = maze.height() as usize * 2 + 1;
    let mut canvas = vec![vec![WALL; columns]; rows];

    for cell in maze.cells().filter(|cell| cell.is_path()) {
        let (x, y) = centre(cell.position());
        canvas[y][x] = FLOOR;
        if !cell.has_wall(Wall::Right) {
            canvas[y][x + 1] = FLOOR;
        }
        if !cell.has_wall(Wall::Down) {
            canvas[y + 1][x] = FLOOR;
        }
    }

    if let Some(position) = treasure {
        let (x, y) = centre(position);
        canvas[y][x] = TREASURE;
    }

    for player in players
        .iter()
        .filter(|player| player.state() != PlayerState::Disabled)
    {
        let (x, y) = centre(player.position());
        canvas[y][x] = char::from_digit(u32::from(player.id().get()), 10).unwrap_or('?');
    }

    canvas
        .into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn centre(position: Position) -> (usize, usize) {
    (
        position.x() as usize * 2 + 1,
        position.y() as usize * 2 + 1,
    )
}
