use crate::agent::{Agent, AgentType, PerType};
use crate::config::{BehaviorSettings, SimConfig, SimConfigError};
use crate::rng::{create_rng, random_heading};
use crate::spatial::{BruteForceIndex, GridIndex, IndexStrategy, SpatialIndex};
use crate::stats::{self, Stats};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use std::time::Instant;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepTimings {
    pub index_build_us: u64,
    pub agent_update_us: u64,
    pub collision_us: u64,
    pub total_us: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldInitError {
    #[error(transparent)]
    Config(#[from] SimConfigError),
    #[error("total agents ({actual}) exceeds supported maximum ({max})")]
    TooManyAgents { max: usize, actual: usize },
}

/// Owns every agent plus the statistics and randomness of one simulation.
pub struct World {
    pub agents: Vec<Agent>,
    config: SimConfig,
    /// Effective settings per type, refreshed at the top of every step.
    resolved: PerType<BehaviorSettings>,
    brute_force: BruteForceIndex,
    grid: GridIndex,
    rng: ChaCha12Rng,
    stats: Stats,
    elapsed_ms: f64,
    step_index: u64,
    skipped_updates: u64,
}

impl World {
    pub fn new(config: SimConfig) -> Result<Self, WorldInitError> {
        config.validate()?;
        Ok(Self {
            agents: Vec::new(),
            resolved: config.resolve_all(),
            brute_force: BruteForceIndex,
            grid: GridIndex::new(config.grid_cell_size),
            rng: create_rng(config.seed),
            stats: Stats::default(),
            elapsed_ms: 0.0,
            step_index: 0,
            skipped_updates: 0,
            config,
        })
    }

    /// Build a world around a hand-placed population.
    pub fn with_agents(agents: Vec<Agent>, config: SimConfig) -> Result<Self, WorldInitError> {
        if agents.len() > SimConfig::MAX_TOTAL_AGENTS {
            return Err(WorldInitError::TooManyAgents {
                max: SimConfig::MAX_TOTAL_AGENTS,
                actual: agents.len(),
            });
        }
        let mut world = Self::new(config)?;
        world.agents = agents;
        Ok(world)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Swap in new knobs; agents and statistics are kept.
    pub fn set_config(&mut self, config: SimConfig) -> Result<(), SimConfigError> {
        config.validate()?;
        self.resolved = config.resolve_all();
        self.grid.set_cell_size(config.grid_cell_size);
        self.config = config;
        Ok(())
    }

    pub fn resolved_settings(&self, kind: AgentType) -> &BehaviorSettings {
        &self.resolved[kind]
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Agent updates dropped because they produced non-finite state.
    pub fn skipped_updates(&self) -> u64 {
        self.skipped_updates
    }

    pub fn strategy(&self) -> IndexStrategy {
        IndexStrategy::for_mode(self.config.optimized_mode)
    }

    pub fn counts(&self) -> PerType<usize> {
        stats::count_by_type(&self.agents)
    }

    /// Replace the population with `counts` freshly placed agents.
    ///
    /// Agents land uniformly inside the playfield inset by twice the entity
    /// size, heading in a random direction at the global max speed. Ids start
    /// at zero on every call.
    pub fn spawn(&mut self, counts: PerType<usize>) {
        self.agents.clear();
        self.agents.reserve(counts.total());
        let base = self.config.behavior;
        let padding = base.entity_size * 2.0;
        // Fields narrower than the padding pin every agent to the padding offset.
        let span = [
            (self.config.playfield.width - padding).max(0.0),
            (self.config.playfield.height - padding).max(0.0),
        ];

        let mut next_id = 0u32;
        for (kind, &count) in counts.iter() {
            let size = self.resolved[kind].entity_size;
            for _ in 0..count {
                let x = padding / 2.0 + self.rng.random::<f64>() * span[0];
                let y = padding / 2.0 + self.rng.random::<f64>() * span[1];
                let (sin, cos) = random_heading(&mut self.rng).sin_cos();
                let velocity = [cos * base.max_speed, sin * base.max_speed];
                self.agents.push(Agent::new(
                    next_id,
                    kind,
                    [x, y],
                    velocity,
                    size,
                    self.elapsed_ms,
                ));
                next_id += 1;
            }
        }
        debug!(
            rock = counts.rock,
            paper = counts.paper,
            scissors = counts.scissors,
            "spawned agents"
        );
    }

    /// Drop agents and statistics and rewind the clock and the random stream.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.stats = Stats::default();
        self.elapsed_ms = 0.0;
        self.step_index = 0;
        self.skipped_updates = 0;
        self.rng = create_rng(self.config.seed);
    }

    /// The single type every agent shares, if any agents remain.
    pub fn sole_type(&self) -> Option<AgentType> {
        let first = self.agents.first()?.kind;
        self.agents
            .iter()
            .all(|agent| agent.kind == first)
            .then_some(first)
    }

    /// True once no two types coexist.
    pub fn is_finished(&self) -> bool {
        self.agents.is_empty() || self.sole_type().is_some()
    }

    pub fn refresh_speed_stats(&mut self) {
        self.stats.avg_speeds = stats::average_speeds(&self.agents);
    }

    /// Advance the simulation by one frame of `dt_ms` milliseconds.
    ///
    /// Movement is one velocity step per call regardless of `dt_ms`; the delta
    /// only feeds simulated time (lifespans, sampling).
    pub fn step(&mut self, dt_ms: f64) -> StepTimings {
        let total_start = Instant::now();
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.elapsed_ms += dt_ms;
        }
        self.step_index = self.step_index.saturating_add(1);
        self.resolved = self.config.resolve_all();

        let t0 = Instant::now();
        let strategy = self.strategy();
        if strategy == IndexStrategy::Grid {
            self.grid.rebuild(&self.agents, self.config.playfield);
        }
        let index_build_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        self.step_movement_phase(strategy);
        let agent_update_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.step_collision_phase(strategy);
        let collision_us = t2.elapsed().as_micros() as u64;

        StepTimings {
            index_build_us,
            agent_update_us,
            collision_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }
}

mod phases;
