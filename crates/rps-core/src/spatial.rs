use crate::agent::{Agent, NeighborScan};
use crate::config::{BehaviorSettings, Playfield};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Which neighbor-search implementation drives a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    BruteForce,
    Grid,
}

impl IndexStrategy {
    pub fn for_mode(optimized: bool) -> Self {
        if optimized {
            IndexStrategy::Grid
        } else {
            IndexStrategy::BruteForce
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStrategy::BruteForce => f.write_str("brute-force"),
            IndexStrategy::Grid => f.write_str("grid"),
        }
    }
}

/// Squared radii governing one agent's scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborQuery {
    pub separation_dist_sq: f64,
    /// Prey/predator cutoff. Only the brute-force scan honours it.
    pub detection_radius_sq: f64,
}

impl NeighborQuery {
    pub fn for_agent(agent: &Agent, settings: &BehaviorSettings) -> Self {
        Self {
            separation_dist_sq: settings.separation_distance_sq(agent.size),
            detection_radius_sq: settings.detection_radius_sq(agent.size),
        }
    }
}

/// Neighbor search and contact enumeration over a slice of agents.
///
/// Indices handed out (in [`NeighborScan`] hits and contact pairs) refer to the
/// slice passed in, which must not be reordered between `rebuild` and use.
pub trait SpatialIndex {
    fn strategy(&self) -> IndexStrategy;

    /// Refresh internal structures from current positions.
    fn rebuild(&mut self, agents: &[Agent], playfield: Playfield);

    /// Closest prey, closest predator and separation push for `agents[index]`.
    fn scan(&self, agents: &[Agent], index: usize, query: &NeighborQuery) -> NeighborScan;

    /// Every unordered pair whose bodies overlap, each reported once.
    fn contact_pairs(&self, agents: &[Agent]) -> Vec<(usize, usize)>;
}

/// Bodies overlap when the centre distance is below the sum of both sizes.
pub fn in_contact(a: &Agent, b: &Agent) -> bool {
    let reach = a.size + b.size;
    distance_sq(a.position, b.position) < reach * reach
}

fn distance_sq(from: [f64; 2], to: [f64; 2]) -> f64 {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    dx * dx + dy * dy
}

fn visit_candidate(
    scan: &mut NeighborScan,
    agents: &[Agent],
    index: usize,
    other_index: usize,
    query: &NeighborQuery,
    honour_detection: bool,
) {
    let agent = &agents[index];
    let other = &agents[other_index];
    let delta = [
        other.position[0] - agent.position[0],
        other.position[1] - agent.position[1],
    ];
    let dist_sq = delta[0] * delta[0] + delta[1] * delta[1];

    if !honour_detection || dist_sq < query.detection_radius_sq {
        scan.offer_target(agent.kind, other, other_index, dist_sq);
    }
    if other.kind == agent.kind {
        scan.offer_separation(delta, dist_sq, query.separation_dist_sq);
    }
}

/// Exhaustive O(n²) scan. Exact with respect to the detection radius.
#[derive(Clone, Debug, Default)]
pub struct BruteForceIndex;

impl SpatialIndex for BruteForceIndex {
    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::BruteForce
    }

    fn rebuild(&mut self, _agents: &[Agent], _playfield: Playfield) {}

    fn scan(&self, agents: &[Agent], index: usize, query: &NeighborQuery) -> NeighborScan {
        let mut scan = NeighborScan::default();
        for other_index in 0..agents.len() {
            if other_index == index {
                continue;
            }
            visit_candidate(&mut scan, agents, index, other_index, query, true);
        }
        scan
    }

    fn contact_pairs(&self, agents: &[Agent]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..agents.len() {
            for j in (i + 1)..agents.len() {
                if in_contact(&agents[i], &agents[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

/// Forward half of the 8-neighborhood (right, down-right, down, down-left) as `(row, col)` steps.
const FORWARD_NEIGHBORS: [(i64, i64); 4] = [(0, 1), (1, 1), (1, 0), (1, -1)];

/// Uniform bucket grid rebuilt from scratch every tick.
///
/// Queries only look at the 3×3 block of cells around the agent and apply no
/// detection cutoff, so sight range is bounded by the window rather than by
/// the configured radius.
#[derive(Clone, Debug)]
pub struct GridIndex {
    cell_size: f64,
    rows: usize,
    cols: usize,
    /// Row-major agent indices per cell.
    cells: Vec<Vec<usize>>,
    degenerate: bool,
}

impl GridIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            rows: 0,
            cols: 0,
            cells: Vec::new(),
            degenerate: false,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn set_cell_size(&mut self, cell_size: f64) {
        self.cell_size = cell_size;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Agent indices bucketed in one cell, `None` outside the current grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<&[usize]> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).map(Vec::as_slice)
    }

    /// Unclamped cell coordinates `(row, col)` of a point.
    fn cell_of(&self, position: [f64; 2]) -> (i64, i64) {
        (
            (position[1] / self.cell_size).floor() as i64,
            (position[0] / self.cell_size).floor() as i64,
        )
    }

    fn cell_at(&self, row: i64, col: i64) -> Option<&[usize]> {
        if row < 0 || col < 0 {
            return None;
        }
        self.cell(row as usize, col as usize)
    }
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_GRID_CELL_SIZE)
    }
}

impl SpatialIndex for GridIndex {
    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::Grid
    }

    fn rebuild(&mut self, agents: &[Agent], playfield: Playfield) {
        self.cells.clear();
        let dimensions = if playfield.has_area() {
            playfield.grid_dimensions(self.cell_size)
        } else {
            None
        };
        let Some((rows, cols)) = dimensions else {
            if !self.degenerate {
                warn!(
                    width = playfield.width,
                    height = playfield.height,
                    cell_size = self.cell_size,
                    "playfield has no area or needs too many cells; spatial grid left empty"
                );
            }
            self.degenerate = true;
            self.rows = 0;
            self.cols = 0;
            return;
        };
        self.degenerate = false;
        self.rows = rows;
        self.cols = cols;
        self.cells.resize_with(rows * cols, Vec::new);

        let max_row = (self.rows - 1) as i64;
        let max_col = (self.cols - 1) as i64;
        for (index, agent) in agents.iter().enumerate() {
            let (row, col) = self.cell_of(agent.position);
            let row = row.clamp(0, max_row) as usize;
            let col = col.clamp(0, max_col) as usize;
            self.cells[row * self.cols + col].push(index);
        }
    }

    fn scan(&self, agents: &[Agent], index: usize, query: &NeighborQuery) -> NeighborScan {
        let mut scan = NeighborScan::default();
        let (row, col) = self.cell_of(agents[index].position);
        for row_offset in -1..=1 {
            for col_offset in -1..=1 {
                let Some(cell) = self.cell_at(
                    row.saturating_add(row_offset),
                    col.saturating_add(col_offset),
                ) else {
                    continue;
                };
                for &other_index in cell {
                    if other_index == index {
                        continue;
                    }
                    visit_candidate(&mut scan, agents, index, other_index, query, false);
                }
            }
        }
        scan
    }

    fn contact_pairs(&self, agents: &[Agent]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut check = |a: usize, b: usize, pairs: &mut Vec<(usize, usize)>| {
            let (id_a, id_b) = (agents[a].id, agents[b].id);
            let key = if id_a < id_b { (id_a, id_b) } else { (id_b, id_a) };
            if !seen.insert(key) {
                return;
            }
            if in_contact(&agents[a], &agents[b]) {
                pairs.push((a, b));
            }
        };

        for row in 0..self.rows {
            for col in 0..self.cols {
                let Some(cell) = self.cell(row, col) else {
                    continue;
                };
                for (i, &a) in cell.iter().enumerate() {
                    for &b in &cell[i + 1..] {
                        check(a, b, &mut pairs);
                    }
                }
                for (row_step, col_step) in FORWARD_NEIGHBORS {
                    let Some(neighbor) =
                        self.cell_at(row as i64 + row_step, col as i64 + col_step)
                    else {
                        continue;
                    };
                    for &a in cell {
                        for &b in neighbor {
                            check(a, b, &mut pairs);
                        }
                    }
                }
            }
        }
        pairs
    }
}
