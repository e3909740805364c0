//! Per-player state tracked by the coordinator.

use treasure_hunt_core::{PlayerId, PlayerState, Position};

/// A player's piece and lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Player {
    pub(crate) id: PlayerId,
    pub(crate) anchor: Position,
    pub(crate) position: Position,
    pub(crate) state: PlayerState,
    pub(crate) reach_distance: u32,
}

impl Player {
    pub(crate) const fn at_anchor(id: PlayerId, anchor: Position, reach_distance: u32) -> Self {
        Self {
            id,
            anchor,
            position: anchor,
            state: PlayerState::Placing,
            reach_distance,
        }
    }

    /// Identifier of the player.
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Fixed starting cell of the player.
    #[must_use]
    pub const fn anchor(&self) -> Position {
        self.anchor
    }

    /// Cell the player's piece currently occupies.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Lifecycle state of the player.
    #[must_use]
    pub const fn state(&self) -> PlayerState {
        self.state
    }

    /// Cells the piece may cover in one move.
    #[must_use]
    pub const fn reach_distance(&self) -> u32 {
        self.reach_distance
    }
}
