use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use treasure_hunt_core::{
    DetectionError, DetectionReport, DetectionRequest, DetectionService, Event, GameState, Input,
    PlayerId, PlayerState, Position, ReportId, Scheduler, StaleReason, Timer,
};
use treasure_hunt_system_turn_coordinator::{Coordinator, CoordinatorConfig, Pacing};
use treasure_hunt_world::{distance_map, reachable_within, MazeGrid};

#[derive(Default)]
struct RecordingDetection {
    requests: Vec<DetectionRequest>,
}

impl DetectionService for RecordingDetection {
    fn send(&mut self, request: DetectionRequest) -> Result<(), DetectionError> {
        self.requests.push(request);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    timers: Vec<(Duration, Timer)>,
}

impl Scheduler for RecordingScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) {
        self.timers.push((delay, timer));
    }
}

type Harness = Coordinator<RecordingDetection, RecordingScheduler, ChaCha8Rng>;

fn harness(width: u32, height: u32, seed: u64) -> Harness {
    configured_harness(CoordinatorConfig::default(), width, height, seed)
}

fn configured_harness(config: CoordinatorConfig, width: u32, height: u32, seed: u64) -> Harness {
    let maze = MazeGrid::new(width, height).expect("grid");
    Coordinator::new(
        config,
        maze,
        RecordingDetection::default(),
        RecordingScheduler::default(),
        ChaCha8Rng::seed_from_u64(seed),
    )
    .expect("coordinator")
}

fn fire_pending(coordinator: &mut Harness, events: &mut Vec<Event>) -> Vec<Timer> {
    let pending: Vec<Timer> = coordinator
        .scheduler_mut()
        .timers
        .drain(..)
        .map(|(_, timer)| timer)
        .collect();
    for timer in &pending {
        coordinator.handle(Input::Timer(*timer), events);
    }
    pending
}

fn enter_placement(coordinator: &mut Harness, events: &mut Vec<Event>) {
    coordinator.begin_round(events);
    let _ = fire_pending(coordinator, events);
    let _ = fire_pending(coordinator, events);
    assert_eq!(coordinator.game_state(), GameState::InitialPlacement);
}

fn found_at(player: PlayerId, position: Position) -> Input {
    Input::Detection(DetectionReport::PieceFoundAt {
        report_id: ReportId::for_player(player),
        position,
    })
}

fn moved_to(player: PlayerId, position: Position) -> Input {
    Input::Detection(DetectionReport::PieceMovedTo {
        report_id: ReportId::for_player(player),
        position,
    })
}

fn place(coordinator: &mut Harness, player: PlayerId, events: &mut Vec<Event>) {
    let anchor = coordinator.player(player).expect("player").anchor();
    coordinator.handle(found_at(player, anchor), events);
}

fn step_away(coordinator: &Harness, player: PlayerId) -> Position {
    let position = coordinator.player(player).expect("player").position();
    coordinator
        .legal_moves(player)
        .into_iter()
        .find(|cell| *cell != position && Some(*cell) != coordinator.treasure_position())
        .expect("a legal move away from the current cell")
}

fn states(coordinator: &Harness) -> Vec<PlayerState> {
    coordinator.players().iter().map(|player| player.state()).collect()
}

fn play_solo_round(seed: u64) -> (Harness, Vec<Event>) {
    let mut coordinator = harness(15, 11, seed);
    let mut events = Vec::new();
    let solo = PlayerId::new(0);

    enter_placement(&mut coordinator, &mut events);
    place(&mut coordinator, solo, &mut events);
    let _ = fire_pending(&mut coordinator, &mut events);

    let treasure = coordinator.treasure_position().expect("treasure");
    let guide = distance_map(coordinator.maze(), treasure);

    for _ in 0..500 {
        let next = coordinator
            .legal_moves(solo)
            .into_iter()
            .min_by_key(|cell| guide.distance(*cell).unwrap_or(u32::MAX))
            .expect("legal move");
        coordinator.handle(moved_to(solo, next), &mut events);
        if coordinator.winner().is_some() {
            break;
        }
        let _ = fire_pending(&mut coordinator, &mut events);
    }

    (coordinator, events)
}

#[test]
fn boot_resets_then_calibrates_then_starts_round() {
    let mut coordinator = harness(11, 9, 1);
    let mut events = Vec::new();

    coordinator.start();
    assert_eq!(
        coordinator.detection().requests,
        vec![DetectionRequest::ResetBoard { resolution: None }]
    );

    coordinator.handle(Input::Detection(DetectionReport::BoardReset), &mut events);
    assert_eq!(
        coordinator.detection().requests.last(),
        Some(&DetectionRequest::CalibrateBoard)
    );
    assert!(events.is_empty());

    coordinator.handle(Input::Detection(DetectionReport::BoardCalibrated), &mut events);
    assert_eq!(coordinator.round(), 1);
    assert_eq!(coordinator.game_state(), GameState::Initializing);
    assert!(matches!(
        events.as_slice(),
        [Event::RoundStarted { round: 1, anchors, .. }] if anchors.len() == 4
    ));
    assert_eq!(
        coordinator.scheduler().timers,
        vec![(Duration::from_millis(1_500), Timer::Settled { round: 1 })]
    );

    events.clear();
    coordinator.handle(Input::Detection(DetectionReport::BoardCalibrated), &mut events);
    assert_eq!(
        events,
        vec![Event::StaleReportIgnored {
            report: DetectionReport::BoardCalibrated,
            reason: StaleReason::WrongPhase,
        }]
    );
    assert_eq!(coordinator.round(), 1);
}

#[test]
fn placement_watches_every_anchor_with_tolerance() {
    let mut coordinator = harness(11, 9, 2);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    assert!(events.contains(&Event::PlacementStarted { round: 1 }));

    let watches: Vec<&DetectionRequest> = coordinator
        .detection()
        .requests
        .iter()
        .filter(|request| matches!(request, DetectionRequest::WatchForPieceAtPosition { .. }))
        .collect();
    assert_eq!(watches.len(), 4);

    for (player, request) in PlayerId::all().zip(watches) {
        let anchor = coordinator.player(player).expect("player").anchor();
        let expected = reachable_within(coordinator.maze(), anchor, 5 + 2);
        assert_eq!(
            request,
            &DetectionRequest::WatchForPieceAtPosition {
                area: coordinator.config().area,
                candidates: expected,
                initial_position: anchor,
                report_id: ReportId::for_player(player),
            }
        );
    }
}

#[test]
fn first_placed_player_takes_the_turn_and_reveals_treasure() {
    let mut coordinator = harness(11, 9, 3);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);
    events.clear();

    place(&mut coordinator, PlayerId::new(3), &mut events);
    place(&mut coordinator, PlayerId::new(1), &mut events);

    let anchor_three = coordinator.player(PlayerId::new(3)).expect("player").anchor();
    let anchor_one = coordinator.player(PlayerId::new(1)).expect("player").anchor();
    assert_eq!(
        events,
        vec![
            Event::PlayerPlaced {
                player: PlayerId::new(3),
                position: anchor_three,
                first: true,
            },
            Event::PlayerPlaced {
                player: PlayerId::new(1),
                position: anchor_one,
                first: false,
            },
        ]
    );
    assert_eq!(
        states(&coordinator),
        vec![
            PlayerState::Placing,
            PlayerState::Idle,
            PlayerState::Placing,
            PlayerState::Turn,
        ]
    );
    assert_eq!(
        coordinator.player(PlayerId::new(3)).expect("player").reach_distance(),
        3
    );
    assert_eq!(coordinator.current_player(), Some(PlayerId::new(3)));

    let fired = fire_pending(&mut coordinator, &mut events);
    assert!(fired.contains(&Timer::RevealTreasure { round: 1 }));
    let treasure = coordinator.treasure_position().expect("treasure");
    assert!(events.contains(&Event::TreasureRevealed { position: treasure }));

    let watched: Vec<ReportId> = coordinator
        .detection()
        .requests
        .iter()
        .filter_map(|request| match request {
            DetectionRequest::WatchForPieceMovedTo { report_id, .. } => Some(*report_id),
            _ => None,
        })
        .collect();
    assert_eq!(
        watched,
        vec![
            ReportId::for_player(PlayerId::new(3)),
            ReportId::for_player(PlayerId::new(1)),
        ]
    );
}

#[test]
fn misplaced_piece_retries_the_watch() {
    let mut coordinator = harness(11, 9, 4);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);
    events.clear();

    let player = PlayerId::new(1);
    let anchor = coordinator.player(player).expect("player").anchor();
    let beside = coordinator
        .maze()
        .adjacent_connected(anchor)
        .next()
        .expect("anchor has a passage");
    let issued = coordinator.detection().requests.len();

    coordinator.handle(found_at(player, beside), &mut events);

    assert_eq!(
        events,
        vec![Event::PlacementRetried {
            player,
            reported: beside,
        }]
    );
    assert_eq!(
        coordinator.player(player).expect("player").state(),
        PlayerState::Placing
    );
    assert_eq!(coordinator.detection().requests.len(), issued + 1);
    assert!(matches!(
        coordinator.detection().requests.last(),
        Some(DetectionRequest::WatchForPieceAtPosition { report_id, initial_position, .. })
            if *report_id == ReportId::for_player(player) && *initial_position == anchor
    ));
}

#[test]
fn player_two_moving_first_disables_everyone_still_placing() {
    let mut coordinator = harness(11, 9, 5);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    let mover = PlayerId::new(2);
    let anchors: Vec<Position> = coordinator.players().iter().map(|p| p.anchor()).collect();
    assert_eq!(
        anchors,
        vec![
            Position::new(5, 0),
            Position::new(10, 4),
            Position::new(5, 8),
            Position::new(0, 4),
        ]
    );

    place(&mut coordinator, mover, &mut events);
    let _ = fire_pending(&mut coordinator, &mut events);
    events.clear();

    let target = step_away(&coordinator, mover);
    coordinator.handle(moved_to(mover, target), &mut events);

    assert_eq!(coordinator.game_state(), GameState::PlayingGame);
    assert_eq!(
        states(&coordinator),
        vec![
            PlayerState::Disabled,
            PlayerState::Disabled,
            PlayerState::Turn,
            PlayerState::Disabled,
        ]
    );
    assert_eq!(coordinator.player(mover).expect("player").position(), target);
    assert_eq!(
        events,
        vec![
            Event::PlayerDisabled {
                player: PlayerId::new(0)
            },
            Event::PlayerDisabled {
                player: PlayerId::new(1)
            },
            Event::PlayerDisabled {
                player: PlayerId::new(3)
            },
            Event::GameStarted {
                first_player: mover
            },
            Event::PieceMoved {
                player: mover,
                from: anchors[2],
                to: target,
            },
            Event::TurnStarted { player: mover },
        ]
    );
}

#[test]
fn moves_for_other_players_leave_state_unchanged() {
    let mut coordinator = harness(11, 9, 6);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    let first = PlayerId::new(0);
    let second = PlayerId::new(1);
    place(&mut coordinator, first, &mut events);
    place(&mut coordinator, second, &mut events);
    let _ = fire_pending(&mut coordinator, &mut events);

    let target = step_away(&coordinator, first);
    coordinator.handle(moved_to(first, target), &mut events);
    assert_eq!(coordinator.current_player(), Some(second));

    let snapshot = coordinator.players().to_vec();
    let sneaky = step_away(&coordinator, first);
    events.clear();
    coordinator.handle(moved_to(first, sneaky), &mut events);

    assert_eq!(coordinator.players(), snapshot.as_slice());
    assert_eq!(
        events,
        vec![Event::StaleReportIgnored {
            report: DetectionReport::PieceMovedTo {
                report_id: ReportId::for_player(first),
                position: sneaky,
            },
            reason: StaleReason::NotCurrentPlayer,
        }]
    );

    events.clear();
    let disabled = PlayerId::new(2);
    let anchor = coordinator.player(disabled).expect("player").anchor();
    coordinator.handle(moved_to(disabled, anchor), &mut events);
    assert_eq!(coordinator.players(), snapshot.as_slice());
    assert!(matches!(
        events.as_slice(),
        [Event::StaleReportIgnored {
            reason: StaleReason::PlayerDisabled,
            ..
        }]
    ));
}

#[test]
fn duplicate_and_out_of_reach_reports_are_dropped() {
    let mut coordinator = harness(11, 9, 7);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    let player = PlayerId::new(0);
    place(&mut coordinator, player, &mut events);
    events.clear();
    place(&mut coordinator, player, &mut events);
    assert!(matches!(
        events.as_slice(),
        [Event::StaleReportIgnored {
            reason: StaleReason::Duplicate,
            ..
        }]
    ));

    events.clear();
    let anchor = coordinator.player(player).expect("player").anchor();
    let legal = coordinator.legal_moves(player);
    let far = coordinator
        .maze()
        .positions()
        .find(|cell| !legal.contains(cell))
        .expect("a cell out of reach");
    coordinator.handle(moved_to(player, far), &mut events);
    assert_eq!(coordinator.game_state(), GameState::InitialPlacement);
    assert_eq!(coordinator.player(player).expect("player").position(), anchor);
    assert!(matches!(
        events.as_slice(),
        [Event::StaleReportIgnored {
            reason: StaleReason::IllegalTarget,
            ..
        }]
    ));

    events.clear();
    coordinator.handle(moved_to(player, Position::new(40, 40)), &mut events);
    assert!(matches!(
        events.as_slice(),
        [Event::StaleReportIgnored {
            reason: StaleReason::IllegalTarget,
            ..
        }]
    ));

    events.clear();
    coordinator.handle(
        Input::Detection(DetectionReport::PieceMovedTo {
            report_id: ReportId::new(9),
            position: anchor,
        }),
        &mut events,
    );
    assert!(matches!(
        events.as_slice(),
        [Event::StaleReportIgnored {
            reason: StaleReason::UnknownReporter,
            ..
        }]
    ));
}

#[test]
fn legal_moves_exclude_cells_of_active_players() {
    let mut coordinator = harness(3, 3, 8);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);
    place(&mut coordinator, PlayerId::new(0), &mut events);
    place(&mut coordinator, PlayerId::new(1), &mut events);

    for player in PlayerId::all() {
        let moves = coordinator.legal_moves(player);
        for other in coordinator.players() {
            if other.id() != player {
                assert!(
                    !moves.contains(&other.position()),
                    "player {} may land on player {}",
                    player.get(),
                    other.id().get(),
                );
            }
        }
    }

    let mover = PlayerId::new(0);
    let _ = fire_pending(&mut coordinator, &mut events);
    let from = coordinator.player(mover).expect("player").position();
    let target = coordinator
        .legal_moves(mover)
        .into_iter()
        .find(|cell| *cell != from)
        .expect("legal move");
    coordinator.handle(moved_to(mover, target), &mut events);

    if let Some(current) = coordinator.current_player() {
        let piece = coordinator.player(current).expect("player");
        let occupied: Vec<Position> = coordinator
            .players()
            .iter()
            .filter(|other| other.id() != current && other.state() != PlayerState::Disabled)
            .map(|other| other.position())
            .collect();
        let expected: Vec<Position> =
            reachable_within(coordinator.maze(), piece.position(), piece.reach_distance())
                .into_iter()
                .filter(|cell| !occupied.contains(cell))
                .collect();
        assert_eq!(coordinator.legal_moves(current), expected);
    }
}

#[test]
fn reaching_the_treasure_restarts_exactly_once() {
    let (mut coordinator, events) = play_solo_round(9);
    let winner = PlayerId::new(0);
    let treasure = coordinator.treasure_position().expect("treasure");

    assert_eq!(coordinator.winner(), Some(winner));
    assert!(events.contains(&Event::TreasureFound {
        player: winner,
        position: treasure,
    }));
    assert!(coordinator
        .players()
        .iter()
        .all(|player| player.state() == PlayerState::Disabled));
    assert_eq!(coordinator.visible_area(winner), None);

    let mut events = Vec::new();
    for _ in 0..3 {
        coordinator.handle(moved_to(winner, treasure), &mut events);
    }
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(
                event,
                Event::StaleReportIgnored {
                    reason: StaleReason::RoundOver,
                    ..
                }
            ))
            .count(),
        3
    );

    let restarts = coordinator
        .scheduler()
        .timers
        .iter()
        .filter(|(_, timer)| matches!(timer, Timer::RestartRound { .. }))
        .count();
    assert_eq!(restarts, 1);

    let fired = fire_pending(&mut coordinator, &mut events);
    assert!(fired.contains(&Timer::ClearBoard { round: 1 }));
    assert!(events.contains(&Event::BoardCleared { round: 1 }));
    assert_eq!(coordinator.round(), 2);
    assert_eq!(coordinator.winner(), None);
    assert_eq!(coordinator.game_state(), GameState::Initializing);

    for timer in fired {
        coordinator.handle(Input::Timer(timer), &mut events);
    }
    assert_eq!(coordinator.round(), 2, "stale restart started another round");
}

#[test]
fn timers_from_an_earlier_round_are_dropped() {
    let (mut coordinator, _) = play_solo_round(10);
    let mut events = Vec::new();
    let _ = fire_pending(&mut coordinator, &mut events);
    assert_eq!(coordinator.round(), 2);

    let _ = coordinator.scheduler_mut().timers.drain(..);
    events.clear();
    for timer in [
        Timer::Settled { round: 1 },
        Timer::PlacementWatch { round: 1 },
        Timer::RevealTreasure { round: 1 },
        Timer::WatchPlayer {
            round: 1,
            player: PlayerId::new(0),
        },
    ] {
        coordinator.handle(Input::Timer(timer), &mut events);
    }

    assert!(events.is_empty());
    assert!(coordinator.scheduler().timers.is_empty());
    assert_eq!(coordinator.game_state(), GameState::Initializing);
}

#[test]
fn visible_area_widens_by_the_tolerance() {
    let mut coordinator = harness(11, 9, 11);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);
    place(&mut coordinator, PlayerId::new(0), &mut events);

    let piece = *coordinator.player(PlayerId::new(0)).expect("player");
    let area = coordinator.visible_area(PlayerId::new(0)).expect("area");

    assert_eq!(
        area.lit,
        reachable_within(coordinator.maze(), piece.position(), 3)
    );
    assert_eq!(
        area.dim,
        reachable_within(coordinator.maze(), piece.position(), 5)
    );
    assert!(area.lit.iter().all(|cell| area.dim.contains(cell)));
}

#[test]
fn seeded_matches_replay_identically() {
    let (first, first_events) = play_solo_round(12);
    let (second, second_events) = play_solo_round(12);

    assert_eq!(first_events, second_events);
    assert_eq!(first.detection().requests, second.detection().requests);
    assert_eq!(first.treasure_position(), second.treasure_position());
}

#[test]
fn pacing_matches_configured_delays() {
    let maze = MazeGrid::new(11, 9).expect("grid");
    let config = CoordinatorConfig {
        pacing: Pacing::immediate(),
        ..CoordinatorConfig::default()
    };
    let mut coordinator = Coordinator::new(
        config,
        maze,
        RecordingDetection::default(),
        RecordingScheduler::default(),
        ChaCha8Rng::seed_from_u64(13),
    )
    .expect("coordinator");
    let mut events = Vec::new();

    coordinator.begin_round(&mut events);
    assert!(coordinator
        .scheduler()
        .timers
        .iter()
        .all(|(delay, _)| delay.is_zero()));
}

#[test]
fn every_move_cancels_before_the_next_watch() {
    let mut coordinator = harness(11, 9, 14);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    let opening = &coordinator.detection().requests;
    assert_eq!(opening.first(), Some(&DetectionRequest::CancelAllRequests));
    assert_eq!(
        opening
            .iter()
            .skip(1)
            .filter(|request| matches!(request, DetectionRequest::WatchForPieceAtPosition { .. }))
            .count(),
        4
    );

    place(&mut coordinator, PlayerId::new(0), &mut events);
    place(&mut coordinator, PlayerId::new(1), &mut events);
    let _ = fire_pending(&mut coordinator, &mut events);

    let mut mover = PlayerId::new(0);
    for turn in 0..6 {
        let target = step_away(&coordinator, mover);
        let before = coordinator.detection().requests.len();
        coordinator.handle(moved_to(mover, target), &mut events);

        let during = &coordinator.detection().requests[before..];
        assert_eq!(
            during.first(),
            Some(&DetectionRequest::CancelAllRequests),
            "move {turn} did not cancel first"
        );
        assert!(
            during
                .iter()
                .all(|request| *request == DetectionRequest::CancelAllRequests),
            "move {turn} issued a watch before its turn timer"
        );

        let next = coordinator.current_player().expect("a player has the turn");
        let before = coordinator.detection().requests.len();
        let _ = fire_pending(&mut coordinator, &mut events);
        let watches: Vec<&DetectionRequest> =
            coordinator.detection().requests[before..].iter().collect();
        assert!(
            matches!(
                watches.as_slice(),
                [DetectionRequest::WatchForPieceMovedTo { report_id, .. }]
                    if *report_id == ReportId::for_player(next)
            ),
            "turn {turn} watches {watches:?}"
        );

        mover = next;
    }
}

#[test]
fn oversized_tolerance_watches_the_whole_maze() {
    let config = CoordinatorConfig {
        placement_tolerance: u32::MAX,
        ..CoordinatorConfig::default()
    };
    let mut coordinator = configured_harness(config, 9, 7, 15);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    let cell_count = coordinator.maze().cell_count();
    let watched: Vec<usize> = coordinator
        .detection()
        .requests
        .iter()
        .filter_map(|request| match request {
            DetectionRequest::WatchForPieceAtPosition { candidates, .. } => Some(candidates.len()),
            _ => None,
        })
        .collect();
    assert_eq!(watched, vec![cell_count; 4]);

    let area = coordinator.visible_area(PlayerId::new(2)).expect("area");
    assert_eq!(area.dim.len(), cell_count);
}

#[test]
fn placement_report_away_from_a_confirmed_piece_is_stale() {
    let mut coordinator = harness(11, 9, 16);
    let mut events = Vec::new();
    enter_placement(&mut coordinator, &mut events);

    let player = PlayerId::new(0);
    place(&mut coordinator, player, &mut events);
    let anchor = coordinator.player(player).expect("player").anchor();
    let elsewhere = step_away(&coordinator, player);
    events.clear();

    coordinator.handle(found_at(player, elsewhere), &mut events);

    assert_eq!(
        events,
        vec![Event::StaleReportIgnored {
            report: DetectionReport::PieceFoundAt {
                report_id: ReportId::for_player(player),
                position: elsewhere,
            },
            reason: StaleReason::WrongPhase,
        }]
    );
    assert_eq!(coordinator.game_state(), GameState::InitialPlacement);
    assert_eq!(coordinator.player(player).expect("player").position(), anchor);
}
