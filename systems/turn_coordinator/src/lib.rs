#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Turn coordinator that drives a treasure hunt match.
//!
//! The coordinator is a finite-state machine with a single entry point,
//! [`Coordinator::handle`]. Detection reports and fired timers go in; state
//! changes, Detection Service requests, newly scheduled timers, and broadcast
//! [`Event`] values come out. The Detection Service may repeat a report or
//! deliver one long after its watch was cancelled, so every input is checked
//! against the current game state, round, and turn before it mutates anything.

mod config;
mod player;

pub use config::{
    ConfigError, CoordinatorConfig, Pacing, DEFAULT_INITIAL_REACH_DISTANCE,
    DEFAULT_PLACEMENT_TOLERANCE, DEFAULT_REACH_DISTANCE,
};
pub use player::Player;

use log::{debug, info, trace, warn};
use rand::Rng;
use treasure_hunt_core::{
    DetectionError, DetectionReport, DetectionService, Event, GameState, Input, PlayerId,
    PlayerState, Position, ReportId, Scheduler, StaleReason, Timer, PLAYER_COUNT,
};
use treasure_hunt_system_treasure_placement::TreasurePlacement;
use treasure_hunt_world::{anchor_positions, generate, reachable_within, MazeGrid};

/// Cells a renderer should highlight around a piece.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleArea {
    /// Cells within the piece's reach.
    pub lit: Vec<Position>,
    /// Cells within the reach widened by the placement tolerance.
    pub dim: Vec<Position>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Boot {
    Idle,
    AwaitingReset,
    AwaitingCalibration,
    Ready,
}

/// Match state machine wired to its Detection Service and host timer.
pub struct Coordinator<D, S, R> {
    config: CoordinatorConfig,
    maze: MazeGrid,
    placement: TreasurePlacement,
    detection: D,
    scheduler: S,
    rng: R,
    boot: Boot,
    game_state: GameState,
    round: u32,
    players: Vec<Player>,
    current: PlayerId,
    treasure: Option<Position>,
    first_placed: bool,
    winner: Option<PlayerId>,
}

impl<D, S, R> Coordinator<D, S, R>
where
    D: DetectionService,
    S: Scheduler,
    R: Rng,
{
    /// Creates a coordinator that regenerates `maze` at the start of every round.
    pub fn new(
        config: CoordinatorConfig,
        maze: MazeGrid,
        detection: D,
        scheduler: S,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate(&maze)?;

        let anchors = anchor_positions(maze.width(), maze.height(), config.granularity);
        let players = seat_players(&anchors, config.initial_reach_distance);

        Ok(Self {
            placement: TreasurePlacement::new(config.scoring),
            config,
            maze,
            detection,
            scheduler,
            rng,
            boot: Boot::Idle,
            game_state: GameState::Initializing,
            round: 0,
            players,
            current: PlayerId::new(0),
            treasure: None,
            first_placed: false,
            winner: None,
        })
    }

    /// Resets and calibrates the board; the first round begins once calibration completes.
    pub fn start(&mut self) {
        self.boot = Boot::AwaitingReset;
        self.game_state = GameState::Initializing;
        info!("resetting board");
        report_failure(self.detection.reset_board(self.config.resolution));
    }

    /// Generates a new maze, seats the players, and places the treasure.
    ///
    /// Hosts whose board needs no calibration may call this instead of
    /// [`Coordinator::start`].
    pub fn begin_round(&mut self, out_events: &mut Vec<Event>) {
        self.boot = Boot::Ready;
        self.round = self.round.wrapping_add(1);
        report_failure(self.detection.cancel_all_requests());

        self.game_state = GameState::Initializing;
        self.winner = None;
        self.first_placed = false;
        self.current = PlayerId::new(0);
        self.treasure = None;

        if let Err(error) = generate(&mut self.maze, self.config.granularity, &mut self.rng) {
            warn!("round {} stalled: {error}", self.round);
            return;
        }

        let anchors = anchor_positions(
            self.maze.width(),
            self.maze.height(),
            self.config.granularity,
        );
        self.players = seat_players(&anchors, self.config.initial_reach_distance);

        let Some(choice) = self.placement.place(&self.maze, &anchors) else {
            warn!("round {} stalled: no cell is reachable by every player", self.round);
            return;
        };
        self.treasure = Some(choice.position);

        info!(
            "round {} started, treasure at ({}, {})",
            self.round,
            choice.position.x(),
            choice.position.y()
        );
        out_events.push(Event::RoundStarted {
            round: self.round,
            treasure: choice.position,
            anchors: anchors.to_vec(),
        });
        self.scheduler
            .schedule(self.config.pacing.settle, Timer::Settled { round: self.round });
    }

    /// Processes one detection report or fired timer.
    pub fn handle(&mut self, input: Input, out_events: &mut Vec<Event>) {
        match input {
            Input::Detection(report) => self.handle_report(report, out_events),
            Input::Timer(timer) => self.handle_timer(timer, out_events),
        }
    }

    fn handle_report(&mut self, report: DetectionReport, out_events: &mut Vec<Event>) {
        match report {
            DetectionReport::BoardReset => {
                if self.boot == Boot::AwaitingReset {
                    self.boot = Boot::AwaitingCalibration;
                    info!("calibrating board");
                    report_failure(self.detection.calibrate_board());
                } else {
                    ignore(report, StaleReason::WrongPhase, out_events);
                }
            }
            DetectionReport::BoardCalibrated => {
                if self.boot == Boot::AwaitingCalibration {
                    self.begin_round(out_events);
                } else {
                    ignore(report, StaleReason::WrongPhase, out_events);
                }
            }
            DetectionReport::PieceFoundAt {
                report_id,
                position,
            }
            | DetectionReport::PieceMovedTo {
                report_id,
                position,
            } => {
                let Some(player) = report_id.player() else {
                    ignore(report, StaleReason::UnknownReporter, out_events);
                    return;
                };

                if !self.maze.is_position_valid(position) {
                    ignore(report, StaleReason::IllegalTarget, out_events);
                    return;
                }

                match self.game_state {
                    GameState::Initializing => {
                        ignore(report, StaleReason::WrongPhase, out_events);
                    }
                    GameState::InitialPlacement => {
                        self.on_placement_report(player, position, report, out_events);
                    }
                    GameState::PlayingGame => {
                        self.on_move_report(player, position, report, out_events);
                    }
                }
            }
        }
    }

    fn on_placement_report(
        &mut self,
        player: PlayerId,
        position: Position,
        report: DetectionReport,
        out_events: &mut Vec<Event>,
    ) {
        let piece = self.players[player.index()];
        match piece.state {
            PlayerState::Disabled => ignore(report, StaleReason::PlayerDisabled, out_events),
            PlayerState::Placing if position == piece.anchor => {
                self.confirm_placement(player, out_events);
            }
            PlayerState::Placing => {
                debug!(
                    "player {} seen at ({}, {}) before reaching its anchor",
                    player.get(),
                    position.x(),
                    position.y()
                );
                out_events.push(Event::PlacementRetried {
                    player,
                    reported: position,
                });
                self.watch_initial_position(player);
            }
            PlayerState::Idle | PlayerState::Turn => {
                if position == piece.position {
                    ignore(report, StaleReason::Duplicate, out_events);
                } else if matches!(report, DetectionReport::PieceFoundAt { .. }) {
                    ignore(report, StaleReason::WrongPhase, out_events);
                } else if !self.legal_moves(player).contains(&position) {
                    ignore(report, StaleReason::IllegalTarget, out_events);
                } else {
                    self.start_game(player, position, out_events);
                }
            }
        }
    }

    fn on_move_report(
        &mut self,
        player: PlayerId,
        position: Position,
        report: DetectionReport,
        out_events: &mut Vec<Event>,
    ) {
        if self.winner.is_some() {
            ignore(report, StaleReason::RoundOver, out_events);
            return;
        }

        let piece = self.players[player.index()];
        if piece.state == PlayerState::Disabled {
            ignore(report, StaleReason::PlayerDisabled, out_events);
        } else if player != self.current || piece.state != PlayerState::Turn {
            ignore(report, StaleReason::NotCurrentPlayer, out_events);
        } else if position == piece.position {
            ignore(report, StaleReason::Duplicate, out_events);
        } else if !self.legal_moves(player).contains(&position) {
            ignore(report, StaleReason::IllegalTarget, out_events);
        } else {
            self.apply_move(player, position, out_events);
        }
    }

    fn confirm_placement(&mut self, player: PlayerId, out_events: &mut Vec<Event>) {
        let first = !self.first_placed;
        let reach_distance = self.config.reach_distance;
        let piece = &mut self.players[player.index()];
        piece.position = piece.anchor;
        piece.reach_distance = reach_distance;
        piece.state = if first {
            PlayerState::Turn
        } else {
            PlayerState::Idle
        };
        let anchor = piece.anchor;

        if first {
            self.first_placed = true;
            self.current = player;
            self.scheduler.schedule(
                self.config.pacing.treasure_reveal,
                Timer::RevealTreasure { round: self.round },
            );
        }

        info!("player {} placed on its anchor", player.get());
        out_events.push(Event::PlayerPlaced {
            player,
            position: anchor,
            first,
        });
        self.scheduler.schedule(
            self.config.pacing.placement_rewatch,
            Timer::WatchPlayer {
                round: self.round,
                player,
            },
        );
    }

    fn start_game(&mut self, mover: PlayerId, position: Position, out_events: &mut Vec<Event>) {
        report_failure(self.detection.cancel_all_requests());
        self.game_state = GameState::PlayingGame;

        for piece in &mut self.players {
            if piece.id == mover {
                continue;
            }

            match piece.state {
                PlayerState::Placing => {
                    piece.state = PlayerState::Disabled;
                    out_events.push(Event::PlayerDisabled { player: piece.id });
                }
                PlayerState::Idle | PlayerState::Turn => piece.state = PlayerState::Idle,
                PlayerState::Disabled => {}
            }
        }

        self.players[mover.index()].state = PlayerState::Turn;
        self.current = mover;

        info!("player {} moved first, game started", mover.get());
        out_events.push(Event::GameStarted {
            first_player: mover,
        });
        self.apply_move(mover, position, out_events);
    }

    fn apply_move(&mut self, player: PlayerId, to: Position, out_events: &mut Vec<Event>) {
        report_failure(self.detection.cancel_all_requests());

        let piece = &mut self.players[player.index()];
        let from = std::mem::replace(&mut piece.position, to);
        debug!(
            "player {} moved ({}, {}) -> ({}, {})",
            player.get(),
            from.x(),
            from.y(),
            to.x(),
            to.y()
        );
        out_events.push(Event::PieceMoved { player, from, to });

        if self.treasure == Some(to) {
            self.finish_round(player, to, out_events);
        } else {
            self.advance_turn(out_events);
        }
    }

    fn finish_round(&mut self, player: PlayerId, treasure: Position, out_events: &mut Vec<Event>) {
        self.winner = Some(player);
        for piece in &mut self.players {
            piece.state = PlayerState::Disabled;
        }

        info!("player {} found the treasure in round {}", player.get(), self.round);
        out_events.push(Event::TreasureFound {
            player,
            position: treasure,
        });

        let round = self.round;
        self.scheduler
            .schedule(self.config.pacing.board_clear, Timer::ClearBoard { round });
        self.scheduler
            .schedule(self.config.pacing.restart, Timer::RestartRound { round });
    }

    fn advance_turn(&mut self, out_events: &mut Vec<Event>) {
        let mut next = self.current;
        for _ in 0..PLAYER_COUNT {
            next = next.next(PLAYER_COUNT);
            if self.players[next.index()].state != PlayerState::Disabled {
                break;
            }
        }

        for piece in &mut self.players {
            if piece.state != PlayerState::Disabled {
                piece.state = PlayerState::Idle;
            }
        }
        self.players[next.index()].state = PlayerState::Turn;
        self.current = next;

        debug!("turn passes to player {}", next.get());
        out_events.push(Event::TurnStarted { player: next });
        self.scheduler.schedule(
            self.config.pacing.turn_watch,
            Timer::WatchPlayer {
                round: self.round,
                player: next,
            },
        );
    }

    fn handle_timer(&mut self, timer: Timer, out_events: &mut Vec<Event>) {
        if self.round == 0 || timer.round() != self.round {
            trace!("dropping {timer:?}, current round is {}", self.round);
            return;
        }

        match timer {
            Timer::Settled { round } => {
                if self.game_state != GameState::Initializing || self.treasure.is_none() {
                    trace!("dropping {timer:?} in {:?}", self.game_state);
                    return;
                }
                self.game_state = GameState::InitialPlacement;
                self.scheduler.schedule(
                    self.config.pacing.placement_watch,
                    Timer::PlacementWatch { round },
                );
            }
            Timer::PlacementWatch { round } => {
                if self.game_state != GameState::InitialPlacement {
                    trace!("dropping {timer:?} in {:?}", self.game_state);
                    return;
                }
                info!("waiting for pieces on their anchors");
                for player in PlayerId::all() {
                    if self.players[player.index()].state == PlayerState::Placing {
                        self.watch_initial_position(player);
                    }
                }
                out_events.push(Event::PlacementStarted { round });
            }
            Timer::WatchPlayer { player, .. } => self.watch_player(player),
            Timer::RevealTreasure { .. } => match (self.winner, self.treasure) {
                (None, Some(position)) => out_events.push(Event::TreasureRevealed { position }),
                _ => trace!("dropping {timer:?}, treasure is gone"),
            },
            Timer::ClearBoard { round } => {
                if self.winner.is_some() {
                    out_events.push(Event::BoardCleared { round });
                } else {
                    trace!("dropping {timer:?}, round still running");
                }
            }
            Timer::RestartRound { .. } => {
                if self.winner.is_some() {
                    self.begin_round(out_events);
                } else {
                    trace!("dropping {timer:?}, round still running");
                }
            }
        }
    }

    fn watch_initial_position(&mut self, player: PlayerId) {
        let piece = self.players[player.index()];
        let candidates = reachable_within(
            &self.maze,
            piece.anchor,
            piece
                .reach_distance
                .saturating_add(self.config.placement_tolerance),
        );
        report_failure(self.detection.watch_for_piece_at_position(
            self.config.area,
            candidates,
            piece.anchor,
            ReportId::for_player(player),
        ));
    }

    fn watch_player(&mut self, player: PlayerId) {
        let Some(piece) = self.players.get(player.index()).copied() else {
            return;
        };

        let eligible = match self.game_state {
            GameState::Initializing => false,
            GameState::InitialPlacement => piece.state.is_active(),
            GameState::PlayingGame => {
                self.winner.is_none() && player == self.current && piece.state == PlayerState::Turn
            }
        };
        if !eligible {
            trace!("not watching player {} in {:?}", player.get(), self.game_state);
            return;
        }

        let candidates = self.legal_moves(player);
        report_failure(self.detection.watch_for_piece_moved_to(
            self.config.area,
            candidates,
            piece.position,
            ReportId::for_player(player),
        ));
    }

    /// Cells the player's piece may occupy after its next move.
    ///
    /// The set holds every cell within the player's reach, the current cell
    /// included, minus cells occupied by other players still in the round.
    #[must_use]
    pub fn legal_moves(&self, player: PlayerId) -> Vec<Position> {
        let Some(piece) = self.players.get(player.index()) else {
            return Vec::new();
        };

        let occupied: Vec<Position> = self
            .players
            .iter()
            .filter(|other| other.id != player && other.state != PlayerState::Disabled)
            .map(|other| other.position)
            .collect();

        reachable_within(&self.maze, piece.position, piece.reach_distance)
            .into_iter()
            .filter(|cell| !occupied.contains(cell))
            .collect()
    }

    /// Cells a renderer should highlight around the player's piece.
    ///
    /// Disabled players have no visible area.
    #[must_use]
    pub fn visible_area(&self, player: PlayerId) -> Option<VisibleArea> {
        let piece = self.players.get(player.index())?;
        if piece.state == PlayerState::Disabled {
            return None;
        }

        Some(VisibleArea {
            lit: reachable_within(&self.maze, piece.position, piece.reach_distance),
            dim: reachable_within(
                &self.maze,
                piece.position,
                piece
                    .reach_distance
                    .saturating_add(self.config.placement_tolerance),
            ),
        })
    }
}

impl<D, S, R> Coordinator<D, S, R> {
    /// Current match phase.
    #[must_use]
    pub const fn game_state(&self) -> GameState {
        self.game_state
    }

    /// Sequence number of the current round, zero before the first one.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Every player in seating order.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Looks up a single player.
    #[must_use]
    pub fn player(&self, player: PlayerId) -> Option<&Player> {
        self.players.get(player.index())
    }

    /// Player whose turn it is, if any.
    #[must_use]
    pub fn current_player(&self) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|piece| piece.state == PlayerState::Turn)
            .map(Player::id)
    }

    /// Cell holding the treasure in the current round.
    #[must_use]
    pub const fn treasure_position(&self) -> Option<Position> {
        self.treasure
    }

    /// Player that found the treasure in the current round.
    #[must_use]
    pub const fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// Maze of the current round.
    #[must_use]
    pub const fn maze(&self) -> &MazeGrid {
        &self.maze
    }

    /// Configuration the coordinator runs with.
    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Detection Service handle.
    #[must_use]
    pub const fn detection(&self) -> &D {
        &self.detection
    }

    /// Mutable Detection Service handle, used by hosts to pump replies.
    pub fn detection_mut(&mut self) -> &mut D {
        &mut self.detection
    }

    /// Host timer handle.
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable host timer handle, used by hosts to pop due timers.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

fn seat_players(anchors: &[Position; PLAYER_COUNT], reach_distance: u32) -> Vec<Player> {
    PlayerId::all()
        .zip(anchors.iter())
        .map(|(id, anchor)| Player::at_anchor(id, *anchor, reach_distance))
        .collect()
}

fn ignore(report: DetectionReport, reason: StaleReason, out_events: &mut Vec<Event>) {
    debug!("ignoring {report:?}: {reason:?}");
    out_events.push(Event::StaleReportIgnored { report, reason });
}

fn report_failure(result: Result<(), DetectionError>) {
    if let Err(error) = result {
        warn!("detection request failed: {error}");
    }
}
