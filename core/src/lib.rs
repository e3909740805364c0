#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the treasure hunt engine.
//!
//! This crate defines the message surface that connects the maze world, the
//! turn coordinator, and the host adapters. The coordinator talks to the
//! external Detection Service exclusively through [`DetectionRequest`] values
//! and learns about the physical board through [`DetectionReport`] values.
//! Timer-based pacing is expressed as [`Timer`] values the host schedules and
//! later feeds back as [`Input::Timer`]. Everything the coordinator decides is
//! broadcast as [`Event`] values so renderers never need engine internals.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of players taking part in every match, one per compass side.
pub const PLAYER_COUNT: usize = 4;

/// Integer grid coordinate of a single maze cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    x: u32,
    y: u32,
}

impl Position {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the position.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row of the position.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Moves `distance` cells toward the side named by `wall`.
    ///
    /// Returns `None` when the step would leave the non-negative quadrant.
    /// Upper bounds are the grid's concern.
    #[must_use]
    pub fn offset(self, wall: Wall, distance: u32) -> Option<Position> {
        match wall {
            Wall::Up => self.y.checked_sub(distance).map(|y| Self::new(self.x, y)),
            Wall::Right => self.x.checked_add(distance).map(|x| Self::new(x, self.y)),
            Wall::Down => self.y.checked_add(distance).map(|y| Self::new(self.x, y)),
            Wall::Left => self.x.checked_sub(distance).map(|x| Self::new(x, self.y)),
        }
    }
}

/// One of the four sides of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wall {
    /// Side facing decreasing rows.
    Up,
    /// Side facing increasing columns.
    Right,
    /// Side facing increasing rows.
    Down,
    /// Side facing decreasing columns.
    Left,
}

impl Wall {
    /// Every side in clockwise order starting at the top.
    pub const ALL: [Wall; 4] = [Wall::Up, Wall::Right, Wall::Down, Wall::Left];

    /// Flag value used inside a [`WallSet`] and for tile image indices.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Up => 1,
            Self::Right => 2,
            Self::Down => 4,
            Self::Left => 8,
        }
    }

    /// Side of the neighbouring cell that shares this wall.
    #[must_use]
    pub const fn opposite(self) -> Wall {
        match self {
            Self::Up => Self::Down,
            Self::Right => Self::Left,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
        }
    }
}

/// Set of independent wall flags owned by a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallSet(u8);

impl WallSet {
    const FULL_MASK: u8 = 0b1111;

    /// Set containing all four walls.
    #[must_use]
    pub const fn full() -> Self {
        Self(Self::FULL_MASK)
    }

    /// Reports whether the wall is present.
    #[must_use]
    pub const fn contains(self, wall: Wall) -> bool {
        self.0 & wall.bit() != 0
    }

    /// Removes the wall. Removing an absent wall is a no-op.
    pub fn remove(&mut self, wall: Wall) {
        self.0 &= !wall.bit();
    }

    /// Reports whether all four walls are present.
    #[must_use]
    pub const fn is_full(self) -> bool {
        self.0 == Self::FULL_MASK
    }
}

impl Default for WallSet {
    fn default() -> Self {
        Self::full()
    }
}

/// Identifier of a player, equal to its compass slot (0 top, 1 right, 2 bottom, 3 left).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Creates a new player identifier.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Index of the player inside per-player tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Identifier of the player that follows this one in seating order.
    #[must_use]
    pub const fn next(&self, player_count: usize) -> PlayerId {
        Self(((self.0 as usize + 1) % player_count) as u8)
    }

    /// All player identifiers of a match in seating order.
    pub fn all() -> impl Iterator<Item = PlayerId> {
        (0..PLAYER_COUNT as u8).map(PlayerId)
    }
}

/// Reporter identifier attached to watch requests and echoed by reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportId(u32);

impl ReportId {
    /// Creates a reporter identifier from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Reporter identifier used for watches on the provided player's piece.
    #[must_use]
    pub const fn for_player(player: PlayerId) -> Self {
        Self(player.get() as u32)
    }

    /// Retrieves the raw reporter value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Player whose piece the reporter tracks, if the value names one.
    #[must_use]
    pub fn player(&self) -> Option<PlayerId> {
        if (self.0 as usize) < PLAYER_COUNT {
            u8::try_from(self.0).ok().map(PlayerId::new)
        } else {
            None
        }
    }
}

/// Identifier of a tiled board area registered with the Detection Service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaId(u32);

impl AreaId {
    /// Creates a new area identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }
}

/// Camera resolution requested when resetting the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardResolution {
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
}

/// Per-player lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// The piece has not yet been confirmed at its anchor during initial placement.
    Placing,
    /// The piece is on the board and waits for its turn.
    Idle,
    /// The player may move its piece.
    Turn,
    /// The player sits out for the rest of the round.
    Disabled,
}

impl PlayerState {
    /// Reports whether the piece has been confirmed on the board and takes part in play.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Idle | Self::Turn)
    }
}

/// Match lifecycle owned by the turn coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// The board is being prepared or a fresh maze is settling.
    Initializing,
    /// Players are asked to put their pieces on their anchors.
    InitialPlacement,
    /// Players take strict turns moving toward the treasure.
    PlayingGame,
}

/// Formula used to pick the treasure cell from per-player distances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreasureScoring {
    /// Maximises `sum(distance²) * min(distance)`.
    #[default]
    FairSpread,
    /// Minimises `max(distance)²`.
    MinimaxDistance,
}

/// Requests the coordinator issues to the Detection Service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum DetectionRequest {
    /// Resets the camera pipeline, optionally switching resolution.
    ResetBoard {
        /// Camera resolution to use, if a change is required.
        resolution: Option<BoardResolution>,
    },
    /// Locates the physical board in the camera image.
    CalibrateBoard,
    /// Reports once a piece is observed at `initial_position`.
    WatchForPieceAtPosition {
        /// Tiled board area the watch applies to.
        area: AreaId,
        /// Cells where the piece may currently be found.
        candidates: Vec<Position>,
        /// Cell the piece is expected to be placed on.
        initial_position: Position,
        /// Reporter identifier echoed by the resulting report.
        report_id: ReportId,
    },
    /// Reports whenever the tracked piece is observed at a new cell among `candidates`.
    WatchForPieceMovedTo {
        /// Tiled board area the watch applies to.
        area: AreaId,
        /// Cells the piece may legally move to.
        candidates: Vec<Position>,
        /// Cell the piece currently occupies.
        current_position: Position,
        /// Reporter identifier echoed by the resulting report.
        report_id: ReportId,
    },
    /// Retires every previously issued watch.
    CancelAllRequests,
}

impl DetectionRequest {
    /// Wire name of the request kind.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::ResetBoard { .. } => "resetBoard",
            Self::CalibrateBoard => "calibrateBoard",
            Self::WatchForPieceAtPosition { .. } => "watchForPieceAtPosition",
            Self::WatchForPieceMovedTo { .. } => "watchForPieceMovedTo",
            Self::CancelAllRequests => "cancelAllRequests",
        }
    }
}

/// Replies delivered by the Detection Service. A report may arrive more than
/// once and may arrive after the watch that produced it was cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum DetectionReport {
    /// The board reset completed.
    BoardReset,
    /// The board calibration completed.
    BoardCalibrated,
    /// A piece was observed at the watched initial position.
    PieceFoundAt {
        /// Reporter identifier of the originating watch.
        report_id: ReportId,
        /// Cell the piece was observed at.
        position: Position,
    },
    /// A tracked piece was observed at a new cell.
    PieceMovedTo {
        /// Reporter identifier of the originating watch.
        report_id: ReportId,
        /// Cell the piece was observed at.
        position: Position,
    },
}

/// Failures surfaced by a Detection Service handle when sending a request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DetectionError {
    /// The transport to the service is not connected.
    #[error("detection service is not connected")]
    Disconnected,
    /// The service refused the request.
    #[error("detection service rejected {action}: {reason}")]
    Rejected {
        /// Wire name of the rejected request.
        action: &'static str,
        /// Reason given by the service.
        reason: String,
    },
}

/// Handle to the external Detection Service.
///
/// Implementors only need [`DetectionService::send`]; the named operations
/// wrap the matching [`DetectionRequest`] variant.
pub trait DetectionService {
    /// Submits a request. Replies arrive later as [`Input::Detection`].
    fn send(&mut self, request: DetectionRequest) -> Result<(), DetectionError>;

    /// Resets the camera pipeline.
    fn reset_board(&mut self, resolution: Option<BoardResolution>) -> Result<(), DetectionError> {
        self.send(DetectionRequest::ResetBoard { resolution })
    }

    /// Calibrates the board.
    fn calibrate_board(&mut self) -> Result<(), DetectionError> {
        self.send(DetectionRequest::CalibrateBoard)
    }

    /// Watches for a piece to be placed at `initial_position`.
    fn watch_for_piece_at_position(
        &mut self,
        area: AreaId,
        candidates: Vec<Position>,
        initial_position: Position,
        report_id: ReportId,
    ) -> Result<(), DetectionError> {
        self.send(DetectionRequest::WatchForPieceAtPosition {
            area,
            candidates,
            initial_position,
            report_id,
        })
    }

    /// Watches for the piece at `current_position` to move to one of `candidates`.
    fn watch_for_piece_moved_to(
        &mut self,
        area: AreaId,
        candidates: Vec<Position>,
        current_position: Position,
        report_id: ReportId,
    ) -> Result<(), DetectionError> {
        self.send(DetectionRequest::WatchForPieceMovedTo {
            area,
            candidates,
            current_position,
            report_id,
        })
    }

    /// Retires every watch issued so far.
    fn cancel_all_requests(&mut self) -> Result<(), DetectionError> {
        self.send(DetectionRequest::CancelAllRequests)
    }
}

/// Delayed transitions the coordinator asks its host to fire later.
///
/// Every timer names the round it was scheduled in so a timer that outlives
/// its round is recognised as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timer {
    /// The freshly generated maze finished settling on screen.
    Settled {
        /// Round the timer belongs to.
        round: u32,
    },
    /// Initial placement watches should be issued.
    PlacementWatch {
        /// Round the timer belongs to.
        round: u32,
    },
    /// A movement watch should be issued for the player.
    WatchPlayer {
        /// Round the timer belongs to.
        round: u32,
        /// Player whose piece should be watched.
        player: PlayerId,
    },
    /// The treasure should become visible.
    RevealTreasure {
        /// Round the timer belongs to.
        round: u32,
    },
    /// The finished board should be cleared.
    ClearBoard {
        /// Round the timer belongs to.
        round: u32,
    },
    /// A new round should begin.
    RestartRound {
        /// Round the timer belongs to.
        round: u32,
    },
}

impl Timer {
    /// Round the timer was scheduled in.
    #[must_use]
    pub const fn round(&self) -> u32 {
        match self {
            Self::Settled { round }
            | Self::PlacementWatch { round }
            | Self::WatchPlayer { round, .. }
            | Self::RevealTreasure { round }
            | Self::ClearBoard { round }
            | Self::RestartRound { round } => *round,
        }
    }
}

/// Host timer primitive used for pacing.
pub trait Scheduler {
    /// Arranges for `timer` to be delivered as [`Input::Timer`] after `delay`.
    fn schedule(&mut self, delay: Duration, timer: Timer);
}

/// Everything the coordinator reacts to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Input {
    /// A reply from the Detection Service.
    Detection(DetectionReport),
    /// A previously scheduled timer fired.
    Timer(Timer),
}

/// Reasons a detection report is dropped without effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaleReason {
    /// The reporter identifier does not name a player.
    UnknownReporter,
    /// The report does not apply to the current game state.
    WrongPhase,
    /// The report concerns a player other than the one whose turn it is.
    NotCurrentPlayer,
    /// The report concerns a disabled player.
    PlayerDisabled,
    /// The report repeats state the coordinator already holds.
    Duplicate,
    /// The reported cell is not a legal destination.
    IllegalTarget,
    /// The round already ended.
    RoundOver,
}

/// Events broadcast by the coordinator after processing an input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A new maze was generated and the treasure placed.
    RoundStarted {
        /// Sequence number of the round, starting at 1.
        round: u32,
        /// Cell holding the treasure.
        treasure: Position,
        /// Anchor cell of every player in seating order.
        anchors: Vec<Position>,
    },
    /// Players were asked to put their pieces on their anchors.
    PlacementStarted {
        /// Round the placement belongs to.
        round: u32,
    },
    /// A player's piece was confirmed at its anchor.
    PlayerPlaced {
        /// Player whose piece was confirmed.
        player: PlayerId,
        /// Anchor cell of the player.
        position: Position,
        /// Indicates the player was the first one confirmed this round.
        first: bool,
    },
    /// A piece was seen away from its anchor before confirmation; the watch was re-issued.
    PlacementRetried {
        /// Player whose piece was misplaced.
        player: PlayerId,
        /// Cell the piece was observed at.
        reported: Position,
    },
    /// The treasure became visible.
    TreasureRevealed {
        /// Cell holding the treasure.
        position: Position,
    },
    /// The first move of a confirmed piece started turn-based play.
    GameStarted {
        /// Player that moved first and therefore plays first.
        first_player: PlayerId,
    },
    /// A player was excluded from the rest of the round.
    PlayerDisabled {
        /// Player that was disabled.
        player: PlayerId,
    },
    /// A piece moved between two cells.
    PieceMoved {
        /// Player owning the piece.
        player: PlayerId,
        /// Cell the piece left.
        from: Position,
        /// Cell the piece arrived at.
        to: Position,
    },
    /// A player may now move.
    TurnStarted {
        /// Player whose turn began.
        player: PlayerId,
    },
    /// A piece reached the treasure and the round ended.
    TreasureFound {
        /// Player that reached the treasure.
        player: PlayerId,
        /// Cell holding the treasure.
        position: Position,
    },
    /// The finished board was cleared ahead of the restart.
    BoardCleared {
        /// Round that was cleared.
        round: u32,
    },
    /// A detection report was dropped.
    StaleReportIgnored {
        /// Report that was dropped.
        report: DetectionReport,
        /// Why the report no longer applied.
        reason: StaleReason,
    },
}
