use crate::agent::{Agent, AgentType, PerType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillDeath {
    pub kills: u64,
    pub deaths: u64,
}

impl KillDeath {
    /// Kills per death; kills alone when nothing has died yet.
    pub fn ratio(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }
}

/// Running sum of completed lifespans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LifespanTally {
    pub total_ms: f64,
    pub conversions: u64,
}

impl LifespanTally {
    fn record(&mut self, lifespan_ms: f64) {
        self.total_ms += lifespan_ms;
        self.conversions += 1;
    }

    pub fn average_secs(&self) -> f64 {
        if self.conversions == 0 {
            0.0
        } else {
            self.total_ms / self.conversions as f64 / 1000.0
        }
    }
}

/// Mean speed per type and over everyone, as of the last refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedSnapshot {
    pub by_type: PerType<f64>,
    pub overall: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub kill_death: PerType<KillDeath>,
    /// Conversions whose lifespan was recorded.
    pub total_conversions: u64,
    /// Conversions credited to the converting type.
    pub conversions_by_type: PerType<u64>,
    /// Lifespans keyed by the type each life started as.
    pub lifespans: PerType<LifespanTally>,
    pub lifespan_all: LifespanTally,
    pub avg_speeds: SpeedSnapshot,
}

impl Stats {
    pub fn record_kill(&mut self, predator: AgentType, prey: AgentType) {
        self.kill_death[predator].kills += 1;
        self.kill_death[prey].deaths += 1;
        self.conversions_by_type[predator] += 1;
    }

    pub fn record_lifespan(&mut self, original_kind: AgentType, lifespan_ms: f64) {
        self.lifespans[original_kind].record(lifespan_ms);
        self.lifespan_all.record(lifespan_ms);
        self.total_conversions += 1;
    }

    pub fn kill_death_ratios(&self) -> PerType<f64> {
        self.kill_death.map(KillDeath::ratio)
    }

    pub fn average_lifespans_secs(&self) -> PerType<f64> {
        self.lifespans.map(LifespanTally::average_secs)
    }

    /// Conversions per second of simulated time, per converting type and overall.
    pub fn conversion_rates(&self, elapsed_ms: f64) -> (PerType<f64>, f64) {
        let secs = elapsed_ms / 1000.0;
        if secs <= 0.0 {
            return (PerType::default(), 0.0);
        }
        (
            self.conversions_by_type.map(|&n| n as f64 / secs),
            self.total_conversions as f64 / secs,
        )
    }
}

pub fn count_by_type(agents: &[Agent]) -> PerType<usize> {
    let mut counts = PerType::default();
    for agent in agents {
        counts[agent.kind] += 1;
    }
    counts
}

pub fn average_speeds(agents: &[Agent]) -> SpeedSnapshot {
    let mut sums = PerType::<f64>::default();
    let mut counts = PerType::<usize>::default();
    for agent in agents {
        sums[agent.kind] += agent.speed();
        counts[agent.kind] += 1;
    }
    let total_count = counts.total();
    let overall = if total_count == 0 {
        0.0
    } else {
        sums.total() / total_count as f64
    };
    SpeedSnapshot {
        by_type: PerType::from_fn(|kind| {
            if counts[kind] == 0 {
                0.0
            } else {
                sums[kind] / counts[kind] as f64
            }
        }),
        overall,
    }
}

/// Rounds ties away from zero at `decimals` places. `{:.N}` alone rounds
/// exact ties to even, so `0.125` would print as `0.12`.
fn round_half_away(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// `"2.00 (10/5)"`, or `"INF (k/0)"` when there are no deaths.
pub fn format_kdr(kills: u64, deaths: u64) -> String {
    if deaths == 0 {
        format!("INF ({kills}/0)")
    } else {
        let ratio = round_half_away(kills as f64 / deaths as f64, 2);
        format!("{ratio:.2} ({kills}/{deaths})")
    }
}

/// Human-readable elapsed time: `"1.5s"`, `"1m 05s (65.0s)"`, `"1h 01m 05s (3665.0s)"`.
/// Anything not strictly positive reads `"0.0s"`.
pub fn format_elapsed_time(ms: f64) -> String {
    if ms.is_nan() || ms <= 0.0 {
        return "0.0s".to_string();
    }
    let total_secs = ms / 1000.0;
    let hours = (total_secs / 3600.0).floor();
    let minutes = ((total_secs % 3600.0) / 60.0).floor();
    // Half-up, matching how the seconds field has always been displayed.
    let seconds = (total_secs % 60.0).round();
    let shown = round_half_away(total_secs, 1);
    if hours > 0.0 {
        format!("{hours:.0}h {minutes:02.0}m {seconds:02.0}s ({shown:.1}s)")
    } else if minutes > 0.0 {
        format!("{minutes:.0}m {seconds:02.0}s ({shown:.1}s)")
    } else {
        format!("{shown:.1}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdr_formatting() {
        assert_eq!(format_kdr(10, 5), "2.00 (10/5)");
        assert_eq!(format_kdr(0, 0), "INF (0/0)");
        assert_eq!(format_kdr(7, 0), "INF (7/0)");
        assert_eq!(format_kdr(1, 3), "0.33 (1/3)");
    }

    #[test]
    fn kdr_ties_round_away_from_zero() {
        assert_eq!(format_kdr(1, 8), "0.13 (1/8)");
        assert_eq!(format_kdr(3, 8), "0.38 (3/8)");
        assert_eq!(format_kdr(5, 8), "0.63 (5/8)");
    }

    #[test]
    fn elapsed_time_formatting() {
        assert_eq!(format_elapsed_time(0.0), "0.0s");
        assert_eq!(format_elapsed_time(1500.0), "1.5s");
        assert_eq!(format_elapsed_time(59_940.0), "59.9s");
        assert_eq!(format_elapsed_time(65_000.0), "1m 05s (65.0s)");
        assert_eq!(format_elapsed_time(3_665_000.0), "1h 01m 05s (3665.0s)");
    }

    #[test]
    fn elapsed_time_ties_round_away_from_zero() {
        assert_eq!(format_elapsed_time(250.0), "0.3s");
        assert_eq!(format_elapsed_time(750.0), "0.8s");
    }

    #[test]
    fn elapsed_time_clamps_non_positive_to_zero() {
        assert_eq!(format_elapsed_time(-1500.0), "0.0s");
        assert_eq!(format_elapsed_time(-0.0), "0.0s");
        assert_eq!(format_elapsed_time(f64::NAN), "0.0s");
    }

    #[test]
    fn kill_death_ratio_falls_back_to_kills() {
        let kd = KillDeath {
            kills: 4,
            deaths: 0,
        };
        assert_eq!(kd.ratio(), 4.0);
        let kd = KillDeath {
            kills: 3,
            deaths: 2,
        };
        assert_eq!(kd.ratio(), 1.5);
    }

    #[test]
    fn recording_updates_every_counter() {
        let mut stats = Stats::default();
        stats.record_kill(AgentType::Paper, AgentType::Rock);
        stats.record_lifespan(AgentType::Rock, 2000.0);
        stats.record_kill(AgentType::Paper, AgentType::Rock);
        stats.record_lifespan(AgentType::Scissors, 4000.0);

        assert_eq!(stats.kill_death.paper.kills, 2);
        assert_eq!(stats.kill_death.rock.deaths, 2);
        assert_eq!(stats.conversions_by_type.paper, 2);
        assert_eq!(stats.total_conversions, 2);
        assert_eq!(stats.lifespans.rock.average_secs(), 2.0);
        assert_eq!(stats.lifespans.scissors.average_secs(), 4.0);
        assert_eq!(stats.lifespans.paper.average_secs(), 0.0);
        assert_eq!(stats.lifespan_all.average_secs(), 3.0);
    }

    #[test]
    fn conversion_rates_are_zero_before_time_passes() {
        let mut stats = Stats::default();
        stats.record_kill(AgentType::Rock, AgentType::Scissors);
        stats.record_lifespan(AgentType::Scissors, 10.0);
        assert_eq!(stats.conversion_rates(0.0), (PerType::default(), 0.0));
        let (by_type, all) = stats.conversion_rates(500.0);
        assert_eq!(by_type.rock, 2.0);
        assert_eq!(by_type.paper, 0.0);
        assert_eq!(all, 2.0);
    }

    #[test]
    fn speeds_and_counts_per_type() {
        let agents = vec![
            Agent::new(0, AgentType::Rock, [0.0, 0.0], [3.0, 4.0], 1.0, 0.0),
            Agent::new(1, AgentType::Rock, [0.0, 0.0], [1.0, 0.0], 1.0, 0.0),
            Agent::new(2, AgentType::Paper, [0.0, 0.0], [0.0, 2.0], 1.0, 0.0),
        ];
        let counts = count_by_type(&agents);
        assert_eq!((counts.rock, counts.paper, counts.scissors), (2, 1, 0));
        let speeds = average_speeds(&agents);
        assert_eq!(speeds.by_type.rock, 3.0);
        assert_eq!(speeds.by_type.paper, 2.0);
        assert_eq!(speeds.by_type.scissors, 0.0);
        assert!((speeds.overall - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(average_speeds(&[]), SpeedSnapshot::default());
    }
}
