#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays treasure hunt rounds on a simulated board.

mod board;
mod config;
mod render;

use std::io::{self, StdoutLock, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use treasure_hunt_core::{DetectionReport, DetectionRequest, Event, Input, Timer};
use treasure_hunt_system_turn_coordinator::Coordinator;
use treasure_hunt_world::{distance_map, MazeGrid};

use crate::{
    board::{SimulatedBoard, VirtualClock},
    config::{Args, Settings},
    render::render_board,
};

/// Mixed into the seed so the simulated players do not mirror the maze generator.
const BOARD_SEED_SALT: u64 = 0x7EA5_u64 << 32;

type Host = Coordinator<SimulatedBoard, VirtualClock, ChaCha8Rng>;

/// Entry point for the treasure hunt command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::load(&args)?;

    let maze = MazeGrid::new(settings.width, settings.height)
        .context("failed to create the maze grid")?;
    let board = SimulatedBoard::new(settings.seed ^ BOARD_SEED_SALT, settings.simulation);
    let mut coordinator = Coordinator::new(
        settings.coordinator.clone(),
        maze,
        board,
        VirtualClock::default(),
        ChaCha8Rng::seed_from_u64(settings.seed),
    )
    .context("invalid coordinator configuration")?;

    let completed = run(&mut coordinator, &settings)?;
    info!("played {completed} of {} rounds", settings.rounds);
    Ok(())
}

/// Pumps board reports and due timers into the coordinator until enough rounds finish.
fn run(coordinator: &mut Host, settings: &Settings) -> Result<u32> {
    let mut printer = Printer::new(settings.json);
    let mut events = Vec::new();
    let mut completed = 0;

    coordinator.start();

    for _ in 0..settings.max_steps {
        printer.requests(&coordinator.detection_mut().take_sent())?;

        let input = if let Some(report) = coordinator.detection_mut().next_report() {
            Input::Detection(report)
        } else if let Some(timer) = coordinator.scheduler_mut().pop() {
            Input::Timer(timer)
        } else {
            warn!(
                "board went quiet during {:?} of round {}",
                coordinator.game_state(),
                coordinator.round()
            );
            return Ok(completed);
        };
        printer.input(&input)?;

        coordinator.handle(input, &mut events);
        for event in events.drain(..) {
            match &event {
                Event::RoundStarted { treasure, .. } => {
                    let guide = distance_map(coordinator.maze(), *treasure);
                    coordinator.detection_mut().begin_round(guide);
                }
                Event::TreasureFound { .. } => completed += 1,
                _ => {}
            }
            printer.event(coordinator, &event)?;
        }

        if completed >= settings.rounds {
            printer.requests(&coordinator.detection_mut().take_sent())?;
            return Ok(completed);
        }
    }

    warn!("stopped after {} steps", settings.max_steps);
    Ok(completed)
}

#[derive(Serialize)]
#[serde(tag = "kind", content = "line", rename_all = "snake_case")]
enum Line<'a> {
    Request(&'a DetectionRequest),
    Report(&'a DetectionReport),
    Timer(&'a Timer),
    Event(&'a Event),
}

struct Printer {
    json: bool,
    revealed: bool,
    out: StdoutLock<'static>,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            json,
            revealed: false,
            out: io::stdout().lock(),
        }
    }

    fn requests(&mut self, requests: &[DetectionRequest]) -> Result<()> {
        for request in requests {
            self.json_line(&Line::Request(request))?;
        }
        Ok(())
    }

    fn input(&mut self, input: &Input) -> Result<()> {
        match input {
            Input::Detection(report) => self.json_line(&Line::Report(report)),
            Input::Timer(timer) => self.json_line(&Line::Timer(timer)),
        }
    }

    fn event(&mut self, coordinator: &Host, event: &Event) -> Result<()> {
        match event {
            Event::RoundStarted { .. } => self.revealed = false,
            Event::TreasureRevealed { .. } => self.revealed = true,
            _ => {}
        }

        if self.json {
            return self.json_line(&Line::Event(event));
        }

        let millis = coordinator.scheduler().now().as_millis();
        writeln!(self.out, "{millis:>8}ms  {event:?}")?;

        if matches!(
            event,
            Event::RoundStarted { .. } | Event::TurnStarted { .. } | Event::TreasureFound { .. }
        ) {
            let treasure = coordinator
                .treasure_position()
                .filter(|_| self.revealed || matches!(event, Event::TreasureFound { .. }));
            let board = render_board(coordinator.maze(), coordinator.players(), treasure);
            writeln!(self.out, "{board}")?;
        }
        Ok(())
    }

    fn json_line(&mut self, line: &Line<'_>) -> Result<()> {
        if !self.json {
            return Ok(());
        }
        serde_json::to_writer(&mut self.out, line).context("failed to encode output line")?;
        writeln!(self.out)?;
        Ok(())
    }
}
