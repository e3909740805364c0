//! Simulated camera board and virtual timer queue for headless runs.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
    time::Duration,
};

use log::trace;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use treasure_hunt_core::{
    DetectionError, DetectionReport, DetectionRequest, DetectionService, Position, ReportId,
    Scheduler, Timer, PLAYER_COUNT,
};
use treasure_hunt_world::DistanceMap;

use crate::config::SimulationConfig;

/// Detection Service stand-in that answers every watch with a simulated piece.
///
/// Replies are queued and handed to the host one at a time. Depending on the
/// configured odds a reply may be queued twice, or the previous reply may be
/// replayed after the watch that produced it was cancelled.
#[derive(Debug)]
pub(crate) struct SimulatedBoard {
    rng: ChaCha8Rng,
    odds: SimulationConfig,
    inbox: VecDeque<DetectionReport>,
    sent: Vec<DetectionRequest>,
    last_piece_report: Option<DetectionReport>,
    absent: [bool; PLAYER_COUNT],
    guide: Option<DistanceMap>,
}

impl SimulatedBoard {
    pub(crate) fn new(seed: u64, odds: SimulationConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            odds,
            inbox: VecDeque::new(),
            sent: Vec::new(),
            last_piece_report: None,
            absent: [false; PLAYER_COUNT],
            guide: None,
        }
    }

    /// Starts a new round: pieces come back and greedy players follow `guide`.
    pub(crate) fn begin_round(&mut self, guide: DistanceMap) {
        for absent in &mut self.absent {
            *absent = self.rng.gen_bool(self.odds.absent);
        }
        self.guide = Some(guide);
        self.last_piece_report = None;
    }

    /// Next report the host should hand to the coordinator.
    pub(crate) fn next_report(&mut self) -> Option<DetectionReport> {
        self.inbox.pop_front()
    }

    /// Requests received since the previous call.
    pub(crate) fn take_sent(&mut self) -> Vec<DetectionRequest> {
        std::mem::take(&mut self.sent)
    }

    fn deliver(&mut self, report: DetectionReport) {
        if self.rng.gen_bool(self.odds.duplicate) {
            trace!("duplicating {report:?}");
            self.inbox.push_back(report.clone());
        }
        self.last_piece_report = Some(report.clone());
        self.inbox.push_back(report);
    }

    fn answer_placement(&mut self, candidates: &[Position], anchor: Position, report_id: ReportId) {
        let absent = report_id
            .player()
            .is_some_and(|player| self.absent[player.index()]);
        if absent {
            return;
        }

        let position = if self.rng.gen_bool(self.odds.misplace) {
            candidates
                .iter()
                .copied()
                .filter(|cell| *cell != anchor)
                .collect::<Vec<_>>()
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(anchor)
        } else {
            anchor
        };

        self.deliver(DetectionReport::PieceFoundAt {
            report_id,
            position,
        });
    }

    fn answer_move(&mut self, candidates: &[Position], current: Position, report_id: ReportId) {
        let options: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|cell| *cell != current)
            .collect();

        let greedy = self.rng.gen_bool(self.odds.greedy);
        let target = match (&self.guide, greedy) {
            (Some(guide), true) => options
                .iter()
                .copied()
                .min_by_key(|cell| guide.distance(*cell).unwrap_or(u32::MAX)),
            _ => options.choose(&mut self.rng).copied(),
        };

        if let Some(position) = target {
            self.deliver(DetectionReport::PieceMovedTo {
                report_id,
                position,
            });
        }
    }
}

impl DetectionService for SimulatedBoard {
    fn send(&mut self, request: DetectionRequest) -> Result<(), DetectionError> {
        trace!("board received {}", request.action());

        match &request {
            DetectionRequest::ResetBoard { .. } => {
                self.inbox.push_back(DetectionReport::BoardReset);
            }
            DetectionRequest::CalibrateBoard => {
                self.inbox.push_back(DetectionReport::BoardCalibrated);
            }
            DetectionRequest::WatchForPieceAtPosition {
                candidates,
                initial_position,
                report_id,
                ..
            } => self.answer_placement(candidates, *initial_position, *report_id),
            DetectionRequest::WatchForPieceMovedTo {
                candidates,
                current_position,
                report_id,
                ..
            } => self.answer_move(candidates, *current_position, *report_id),
            DetectionRequest::CancelAllRequests => {
                if let Some(report) = self.last_piece_report.take() {
                    if self.rng.gen_bool(self.odds.stale) {
                        trace!("replaying {report:?} after cancellation");
                        self.inbox.push_back(report);
                    }
                }
            }
        }

        self.sent.push(request);
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Scheduled {
    due: Duration,
    sequence: u64,
    timer: Timer,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Timer queue running on simulated time.
///
/// Timers fire in due order; timers due at the same instant fire in the
/// order they were scheduled.
#[derive(Debug, Default)]
pub(crate) struct VirtualClock {
    now: Duration,
    sequence: u64,
    queue: BinaryHeap<Scheduled>,
}

impl VirtualClock {
    /// Simulated time elapsed so far.
    pub(crate) const fn now(&self) -> Duration {
        self.now
    }

    /// Advances to the earliest pending timer and returns it.
    pub(crate) fn pop(&mut self) -> Option<Timer> {
        let next = self.queue.pop()?;
        self.now = self.now.max(next.due);
        Some(next.timer)
    }
}

impl Scheduler for VirtualClock {
    fn schedule(&mut self, delay: Duration, timer: Timer) {
        self.sequence += 1;
        self.queue.push(Scheduled {
            due: self.now + delay,
            sequence: self.sequence,
            timer,
        });
    }
}
