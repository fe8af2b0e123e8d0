use crate::agent::{Agent, AgentType, PerType};
use crate::config::BehaviorSettings;
use crate::stats::Stats;

/// A prey agent taken over by its predator during one contact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conversion {
    pub predator: usize,
    pub prey: usize,
    pub from: AgentType,
    pub to: AgentType,
    /// Lifespan closed by this conversion, if the prey's life was still open.
    pub lifespan_ms: Option<f64>,
}

/// Resolve one contact between `agents[a]` and `agents[b]`.
///
/// The predator converts the prey only when the prey sits inside the predator's
/// predation radius. Same-type pairs never interact.
pub fn resolve_contact(
    agents: &mut [Agent],
    a: usize,
    b: usize,
    settings: &PerType<BehaviorSettings>,
    stats: &mut Stats,
    now_ms: f64,
) -> Option<Conversion> {
    if a == b {
        return None;
    }
    let (predator, prey) = if agents[a].is_predator_of(&agents[b]) {
        (a, b)
    } else if agents[b].is_predator_of(&agents[a]) {
        (b, a)
    } else {
        return None;
    };

    let predator_kind = agents[predator].kind;
    let dx = agents[prey].position[0] - agents[predator].position[0];
    let dy = agents[prey].position[1] - agents[predator].position[1];
    let reach_sq = settings[predator_kind].predation_radius_sq(agents[predator].size);
    if dx * dx + dy * dy >= reach_sq {
        return None;
    }

    let prey_agent = &mut agents[prey];
    let from = prey_agent.kind;
    stats.record_kill(predator_kind, from);

    let lifespan_ms = if prey_agent.death_ms.is_none() {
        prey_agent.death_ms = Some(now_ms);
        let lifespan = now_ms - prey_agent.birth_ms;
        stats.record_lifespan(prey_agent.original_kind, lifespan);
        Some(lifespan)
    } else {
        None
    };
    prey_agent.reincarnate(predator_kind, now_ms);

    Some(Conversion {
        predator,
        prey,
        from,
        to: predator_kind,
        lifespan_ms,
    })
}
