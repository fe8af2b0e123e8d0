use crate::agent::{Agent, AgentType, PerType};
use crate::stats::{count_by_type, Stats};
use serde::{Deserialize, Serialize};

/// One periodic sample of the population and its running statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeseriesRow {
    pub elapsed_secs: f64,
    pub counts: PerType<usize>,
    pub total_count: usize,
    pub kills: PerType<u64>,
    pub total_kills: u64,
    pub deaths: PerType<u64>,
    pub total_deaths: u64,
    pub kdr: PerType<f64>,
    pub avg_lifespan_secs: PerType<f64>,
    pub avg_lifespan_all_secs: f64,
    pub conversion_rates: PerType<f64>,
    pub conversion_rate_all: f64,
}

impl TimeseriesRow {
    pub fn capture(agents: &[Agent], stats: &Stats, elapsed_ms: f64) -> Self {
        let counts = count_by_type(agents);
        let kills = stats.kill_death.map(|kd| kd.kills);
        let deaths = stats.kill_death.map(|kd| kd.deaths);
        let (conversion_rates, conversion_rate_all) = stats.conversion_rates(elapsed_ms);
        Self {
            elapsed_secs: elapsed_ms / 1000.0,
            total_count: counts.total(),
            counts,
            total_kills: kills.total(),
            kills,
            total_deaths: deaths.total(),
            deaths,
            kdr: stats.kill_death_ratios(),
            avg_lifespan_secs: stats.average_lifespans_secs(),
            avg_lifespan_all_secs: stats.lifespan_all.average_secs(),
            conversion_rates,
            conversion_rate_all,
        }
    }
}

/// Fixed-cadence sampler keyed on simulated time.
#[derive(Clone, Debug)]
pub struct Timeseries {
    rows: Vec<TimeseriesRow>,
    collecting: bool,
    interval_ms: f64,
    next_sample_ms: f64,
}

impl Timeseries {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            rows: Vec::new(),
            collecting: false,
            interval_ms,
            next_sample_ms: interval_ms,
        }
    }

    /// Clear previous rows and begin sampling from simulated time zero.
    pub fn start(&mut self, interval_ms: f64) {
        self.reset();
        self.interval_ms = interval_ms;
        self.next_sample_ms = interval_ms;
        self.collecting = true;
    }

    pub fn stop(&mut self) {
        self.collecting = false;
    }

    pub fn reset(&mut self) {
        self.rows.clear();
        self.collecting = false;
        self.next_sample_ms = self.interval_ms;
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    pub fn rows(&self) -> &[TimeseriesRow] {
        &self.rows
    }

    /// Take a row if a sample boundary has been crossed. Several boundaries
    /// crossed in one call still yield a single row.
    pub fn maybe_sample(&mut self, agents: &[Agent], stats: &Stats, elapsed_ms: f64) -> bool {
        if !self.collecting || elapsed_ms < self.next_sample_ms {
            return false;
        }
        self.rows
            .push(TimeseriesRow::capture(agents, stats, elapsed_ms));
        let periods = (elapsed_ms / self.interval_ms).floor() + 1.0;
        self.next_sample_ms = periods * self.interval_ms;
        true
    }

    /// Unconditional sample, used for the terminal row.
    pub fn sample(&mut self, agents: &[Agent], stats: &Stats, elapsed_ms: f64) {
        if self.collecting {
            self.rows
                .push(TimeseriesRow::capture(agents, stats, elapsed_ms));
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub kind: AgentType,
    pub label: String,
    pub emoji: String,
}

impl From<AgentType> for Winner {
    fn from(kind: AgentType) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            emoji: kind.emoji().to_string(),
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticks: u64,
    pub elapsed_ms: f64,
    pub winner: Option<Winner>,
    pub final_counts: PerType<usize>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub samples: Vec<TimeseriesRow>,
}
