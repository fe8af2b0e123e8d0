use crate::interaction::resolve_contact;
use crate::spatial::{IndexStrategy, SpatialIndex};
use tracing::trace;

use super::super::World;

impl World {
    /// Resolve every overlapping pair once, in enumeration order.
    ///
    /// Grid mode reuses the buckets built before movement, so an agent that
    /// crossed into a far cell this tick may miss a contact until next tick.
    pub(in crate::world) fn step_collision_phase(&mut self, strategy: IndexStrategy) {
        let index: &dyn SpatialIndex = match strategy {
            IndexStrategy::BruteForce => &self.brute_force,
            IndexStrategy::Grid => &self.grid,
        };
        let pairs = index.contact_pairs(&self.agents);
        let now_ms = self.elapsed_ms;

        for (a, b) in pairs {
            let outcome = resolve_contact(
                &mut self.agents,
                a,
                b,
                &self.resolved,
                &mut self.stats,
                now_ms,
            );
            if let Some(conversion) = outcome {
                trace!(
                    predator = self.agents[conversion.predator].id,
                    prey = self.agents[conversion.prey].id,
                    from = %conversion.from,
                    to = %conversion.to,
                    "conversion"
                );
            }
        }
    }
}
