use crate::agent::{Agent, AgentType, PerType};
use crate::config::{SimConfig, SimConfigError};
use crate::metrics::{RunSummary, Timeseries, Winner};
use crate::stats::{SpeedSnapshot, Stats};
use crate::world::{StepTimings, World, WorldInitError};
use std::cell::Cell;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Millisecond time source driving frame deltas.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Used for headless runs and tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunState {
    NotStarted,
    Running,
    Paused,
    /// Terminal until reset. `None` when no agents were left to win.
    Ended(Option<Winner>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("{kind} count must not be negative (got {count})")]
    NegativeCount { kind: AgentType, count: i64 },
    #[error("at least one agent is required to start")]
    EmptyPopulation,
    #[error("total agents ({actual}) exceeds supported maximum ({max})")]
    TooManyAgents { max: usize, actual: usize },
    #[error("a simulation is already in progress; reset it first")]
    AlreadyRunning,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Not started, or already ended.
    Idle,
    Paused,
    Advanced(StepTimings),
    /// This tick ended the run.
    Finished(Option<Winner>),
}

fn validate_counts(rock: i64, paper: i64, scissors: i64) -> Result<PerType<usize>, StartError> {
    let requested = PerType {
        rock,
        paper,
        scissors,
    };
    for (kind, &count) in requested.iter() {
        if count < 0 {
            return Err(StartError::NegativeCount { kind, count });
        }
    }
    let counts = requested.map(|&count| count as usize);
    let total = counts
        .iter()
        .fold(0usize, |acc, (_, &count)| acc.saturating_add(count));
    if total == 0 {
        return Err(StartError::EmptyPopulation);
    }
    if total > SimConfig::MAX_TOTAL_AGENTS {
        return Err(StartError::TooManyAgents {
            max: SimConfig::MAX_TOTAL_AGENTS,
            actual: total,
        });
    }
    Ok(counts)
}

/// Start/pause/resume/reset state machine around a [`World`].
///
/// Frames are pushed in from outside through [`Simulation::tick`]; the
/// controller only measures the time between them with its [`Clock`].
pub struct Simulation<C: Clock = SystemClock> {
    world: World,
    clock: C,
    state: RunState,
    timeseries: Timeseries,
    last_tick_ms: f64,
    next_speed_refresh_ms: f64,
    ticks: u64,
}

impl Simulation<SystemClock> {
    pub fn new(config: SimConfig) -> Result<Self, WorldInitError> {
        Self::with_clock(config, SystemClock::default())
    }
}

impl<C: Clock> Simulation<C> {
    pub fn with_clock(config: SimConfig, clock: C) -> Result<Self, WorldInitError> {
        let sample_interval_ms = config.sample_interval_ms;
        let next_speed_refresh_ms = config.stats_refresh_interval_ms;
        Ok(Self {
            world: World::new(config)?,
            clock,
            state: RunState::NotStarted,
            timeseries: Timeseries::new(sample_interval_ms),
            last_tick_ms: 0.0,
            next_speed_refresh_ms,
            ticks: 0,
        })
    }

    /// Spawn a fresh population and begin running.
    ///
    /// Rejected requests leave the controller exactly as it was.
    pub fn start_simulation(
        &mut self,
        rock: i64,
        paper: i64,
        scissors: i64,
    ) -> Result<(), StartError> {
        let validated = if matches!(self.state, RunState::Running | RunState::Paused) {
            Err(StartError::AlreadyRunning)
        } else {
            validate_counts(rock, paper, scissors)
        };
        let counts = match validated {
            Ok(counts) => counts,
            Err(err) => {
                warn!(%err, rock, paper, scissors, "start rejected");
                return Err(err);
            }
        };

        self.world.clear();
        self.world.spawn(counts);
        self.world.refresh_speed_stats();
        let config = self.world.config();
        self.timeseries.start(config.sample_interval_ms);
        self.next_speed_refresh_ms = config.stats_refresh_interval_ms;
        self.last_tick_ms = self.clock.now_ms();
        self.ticks = 0;
        self.state = RunState::Running;
        info!(
            rock = counts.rock,
            paper = counts.paper,
            scissors = counts.scissors,
            strategy = %self.world.strategy(),
            "simulation started"
        );
        Ok(())
    }

    /// Toggle between running and paused. Ignored in any other state.
    pub fn pause_resume_simulation(&mut self) {
        match self.state {
            RunState::Running => {
                self.state = RunState::Paused;
                debug!(elapsed_ms = self.world.elapsed_ms(), "paused");
            }
            RunState::Paused => {
                // Paused wall time must not count toward the next delta.
                self.last_tick_ms = self.clock.now_ms();
                self.state = RunState::Running;
                debug!(elapsed_ms = self.world.elapsed_ms(), "resumed");
            }
            RunState::NotStarted | RunState::Ended(_) => {}
        }
    }

    /// Stop sampling, drop every agent and statistic and return to `NotStarted`.
    pub fn reset_simulation(&mut self) {
        self.timeseries.reset();
        self.state = RunState::NotStarted;
        self.world.clear();
        self.ticks = 0;
        self.last_tick_ms = 0.0;
        self.next_speed_refresh_ms = self.world.config().stats_refresh_interval_ms;
        info!("simulation reset");
    }

    /// Advance one frame using the time elapsed since the previous tick.
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            RunState::NotStarted | RunState::Ended(_) => return TickOutcome::Idle,
            RunState::Paused => return TickOutcome::Paused,
            RunState::Running => {}
        }

        let now_ms = self.clock.now_ms();
        let dt_ms = now_ms - self.last_tick_ms;
        self.last_tick_ms = now_ms;
        let timings = self.world.step(dt_ms);
        self.ticks += 1;

        let elapsed_ms = self.world.elapsed_ms();
        let refresh_interval = self.world.config().stats_refresh_interval_ms;
        if elapsed_ms >= self.next_speed_refresh_ms {
            self.world.refresh_speed_stats();
            self.next_speed_refresh_ms =
                ((elapsed_ms / refresh_interval).floor() + 1.0) * refresh_interval;
        }
        if self
            .timeseries
            .maybe_sample(&self.world.agents, self.world.stats(), elapsed_ms)
        {
            debug!(elapsed_ms, rows = self.timeseries.rows().len(), "sampled");
        }

        if !self.world.is_finished() {
            return TickOutcome::Advanced(timings);
        }
        let winner = self.world.sole_type().map(Winner::from);
        self.world.refresh_speed_stats();
        self.timeseries
            .sample(&self.world.agents, self.world.stats(), elapsed_ms);
        self.timeseries.stop();
        match &winner {
            Some(w) => info!(
                winner = %w.label,
                elapsed_ms,
                ticks = self.ticks,
                "{} {} wins",
                w.emoji,
                w.label
            ),
            None => info!(elapsed_ms, ticks = self.ticks, "simulation ended with no agents"),
        }
        self.state = RunState::Ended(winner.clone());
        TickOutcome::Finished(winner)
    }

    /// Apply new knobs. Sampling cadence changes take effect on the next start.
    pub fn set_config(&mut self, config: SimConfig) -> Result<(), SimConfigError> {
        self.world.set_config(config)
    }

    pub fn config(&self) -> &SimConfig {
        self.world.config()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn agents(&self) -> &[Agent] {
        &self.world.agents
    }

    pub fn stats(&self) -> &Stats {
        self.world.stats()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.world.elapsed_ms()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn winner(&self) -> Option<&Winner> {
        match &self.state {
            RunState::Ended(winner) => winner.as_ref(),
            _ => None,
        }
    }

    /// Speeds as of the last refresh, not the current frame.
    pub fn average_speeds(&self) -> &SpeedSnapshot {
        &self.world.stats().avg_speeds
    }

    pub fn timeseries(&self) -> &Timeseries {
        &self.timeseries
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            schema_version: 1,
            ticks: self.ticks,
            elapsed_ms: self.world.elapsed_ms(),
            winner: self.winner().cloned(),
            final_counts: self.world.counts(),
            stats: self.world.stats().clone(),
            samples: self.timeseries.rows().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BehaviorSettings;
    use crate::stats::average_speeds;

    fn manual() -> Simulation<ManualClock> {
        Simulation::with_clock(SimConfig::default(), ManualClock::new(1_000.0)).unwrap()
    }

    fn frame(sim: &mut Simulation<ManualClock>, ms: f64) -> TickOutcome {
        sim.clock().advance(ms);
        sim.tick()
    }

    #[test]
    fn start_rejects_bad_counts_without_mutating() {
        let mut sim = manual();
        assert_eq!(
            sim.start_simulation(3, -1, 2),
            Err(StartError::NegativeCount {
                kind: AgentType::Paper,
                count: -1
            })
        );
        assert_eq!(
            sim.start_simulation(0, 0, 0),
            Err(StartError::EmptyPopulation)
        );
        assert!(matches!(
            sim.start_simulation(SimConfig::MAX_TOTAL_AGENTS as i64, 1, 0),
            Err(StartError::TooManyAgents { .. })
        ));
        assert_eq!(sim.state(), &RunState::NotStarted);
        assert!(sim.agents().is_empty());
        assert!(!sim.timeseries().is_collecting());
    }

    #[test]
    fn start_spawns_exact_population() {
        let mut sim = manual();
        sim.start_simulation(4, 5, 6).unwrap();
        assert!(sim.is_running());
        assert_eq!(sim.agents().len(), 15);
        let counts = sim.world().counts();
        assert_eq!((counts.rock, counts.paper, counts.scissors), (4, 5, 6));
        assert_eq!(sim.elapsed_ms(), 0.0);
    }

    #[test]
    fn start_while_running_or_paused_is_rejected() {
        let mut sim = manual();
        sim.start_simulation(2, 2, 2).unwrap();
        assert_eq!(sim.start_simulation(1, 1, 1), Err(StartError::AlreadyRunning));
        sim.pause_resume_simulation();
        assert_eq!(sim.start_simulation(1, 1, 1), Err(StartError::AlreadyRunning));
        assert_eq!(sim.agents().len(), 6);
    }

    #[test]
    fn tick_is_idle_before_start() {
        let mut sim = manual();
        assert_eq!(frame(&mut sim, 16.0), TickOutcome::Idle);
        sim.pause_resume_simulation();
        assert_eq!(sim.state(), &RunState::NotStarted);
    }

    #[test]
    fn paused_ticks_freeze_agents_and_time() {
        let mut sim = manual();
        sim.start_simulation(10, 10, 10).unwrap();
        assert!(matches!(frame(&mut sim, 16.0), TickOutcome::Advanced(_)));
        assert_eq!(sim.elapsed_ms(), 16.0);

        sim.pause_resume_simulation();
        assert!(sim.is_paused());
        let frozen: Vec<[f64; 2]> = sim.agents().iter().map(|a| a.position).collect();
        for _ in 0..5 {
            assert_eq!(frame(&mut sim, 100.0), TickOutcome::Paused);
        }
        let after: Vec<[f64; 2]> = sim.agents().iter().map(|a| a.position).collect();
        assert_eq!(frozen, after);
        assert_eq!(sim.elapsed_ms(), 16.0);

        sim.pause_resume_simulation();
        sim.clock().advance(20.0);
        assert!(matches!(sim.tick(), TickOutcome::Advanced(_)));
        // The 500 ms spent paused is excluded.
        assert_eq!(sim.elapsed_ms(), 36.0);
    }

    #[test]
    fn speeds_refresh_on_cadence_only() {
        let config = SimConfig {
            behavior: BehaviorSettings {
                chasing_speed_multiplier: 3.0,
                ..BehaviorSettings::default()
            },
            ..SimConfig::default()
        };
        let mut sim = Simulation::with_clock(config, ManualClock::new(0.0)).unwrap();
        sim.start_simulation(15, 15, 15).unwrap();
        let initial = *sim.average_speeds();
        assert_eq!(initial, average_speeds(sim.agents()));

        frame(&mut sim, 100.0);
        frame(&mut sim, 100.0);
        assert_eq!(sim.average_speeds(), &initial);

        frame(&mut sim, 100.0);
        assert_eq!(sim.average_speeds(), &average_speeds(sim.agents()));
    }

    #[test]
    fn samples_once_per_interval_of_running_time() {
        let mut sim = manual();
        sim.start_simulation(10, 10, 10).unwrap();
        for _ in 0..4 {
            frame(&mut sim, 500.0);
        }
        assert!(sim.is_running());
        let rows = sim.timeseries().rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].elapsed_secs, 1.0);
        assert_eq!(rows[1].elapsed_secs, 2.0);
        assert_eq!(rows[1].total_count, 30);
    }

    #[test]
    fn single_type_population_ends_on_first_tick() {
        let mut sim = manual();
        sim.start_simulation(0, 0, 3).unwrap();
        let outcome = frame(&mut sim, 16.0);
        let expected = Winner::from(AgentType::Scissors);
        assert_eq!(outcome, TickOutcome::Finished(Some(expected.clone())));
        assert_eq!(sim.winner(), Some(&expected));
        assert_eq!(expected.label, "Scissors");

        // Terminal row taken, then collection stops.
        assert_eq!(sim.timeseries().rows().len(), 1);
        assert!(!sim.timeseries().is_collecting());

        assert_eq!(frame(&mut sim, 16.0), TickOutcome::Idle);
        assert_eq!(sim.elapsed_ms(), 16.0);
        sim.pause_resume_simulation();
        assert!(matches!(sim.state(), RunState::Ended(Some(_))));
    }

    #[test]
    fn reset_clears_everything() {
        let mut sim = manual();
        sim.start_simulation(5, 5, 5).unwrap();
        for _ in 0..3 {
            frame(&mut sim, 400.0);
        }
        sim.pause_resume_simulation();
        sim.reset_simulation();

        assert_eq!(sim.state(), &RunState::NotStarted);
        assert!(sim.agents().is_empty());
        assert_eq!(sim.elapsed_ms(), 0.0);
        assert_eq!(sim.stats(), &Stats::default());
        assert!(sim.timeseries().rows().is_empty());
        assert!(!sim.timeseries().is_collecting());
        assert_eq!(sim.winner(), None);
        assert_eq!(sim.ticks(), 0);
    }

    #[test]
    fn restart_after_end_spawns_fresh_ids() {
        let mut sim = manual();
        sim.start_simulation(2, 0, 0).unwrap();
        frame(&mut sim, 16.0);
        assert!(sim.winner().is_some());
        sim.start_simulation(1, 1, 0).unwrap();
        assert!(sim.is_running());
        let ids: Vec<u32> = sim.agents().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(sim.timeseries().rows().is_empty());
    }

    #[test]
    fn summary_reflects_final_state() {
        let mut sim = manual();
        sim.start_simulation(4, 0, 0).unwrap();
        frame(&mut sim, 16.0);
        let summary = sim.summary();
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.elapsed_ms, 16.0);
        assert_eq!(summary.final_counts.rock, 4);
        assert_eq!(summary.winner.map(|w| w.kind), Some(AgentType::Rock));
        assert_eq!(summary.samples.len(), 1);
    }
}
