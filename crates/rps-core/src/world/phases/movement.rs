use crate::spatial::{IndexStrategy, NeighborQuery, SpatialIndex};
use tracing::warn;

use super::super::World;

impl World {
    /// Scan and steer every agent in order. Later agents see the positions
    /// earlier agents moved to during this same phase.
    pub(in crate::world) fn step_movement_phase(&mut self, strategy: IndexStrategy) {
        let index: &dyn SpatialIndex = match strategy {
            IndexStrategy::BruteForce => &self.brute_force,
            IndexStrategy::Grid => &self.grid,
        };
        let playfield = self.config.playfield;
        let warp_edges = self.config.warp_edges;

        for i in 0..self.agents.len() {
            let settings = &self.resolved[self.agents[i].kind];
            self.agents[i].size = settings.entity_size;
            let query = NeighborQuery::for_agent(&self.agents[i], settings);
            let scan = index.scan(&self.agents, i, &query);

            let agent = &mut self.agents[i];
            agent.scan = scan;
            if let Err(err) = agent.steer(settings, playfield, warp_edges, &mut self.rng) {
                warn!(step = self.step_index, %err, "skipping agent update");
                self.skipped_updates += 1;
            }
        }
    }
}
