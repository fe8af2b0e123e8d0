use crate::config::{BehaviorSettings, Playfield};
use crate::constants::{MIN_STEERING_MAGNITUDE, STATIONARY_SPEED_EPSILON, WANDER_TURN_SPAN};
use crate::rng::{centered_noise, random_unit_vector};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// The three species of the cycle. Each one hunts exactly one other and is
/// hunted by the remaining one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Rock,
    Paper,
    Scissors,
}

impl AgentType {
    pub const ALL: [AgentType; 3] = [AgentType::Rock, AgentType::Paper, AgentType::Scissors];

    /// The type this one converts on contact.
    pub fn prey(self) -> AgentType {
        match self {
            AgentType::Rock => AgentType::Scissors,
            AgentType::Paper => AgentType::Rock,
            AgentType::Scissors => AgentType::Paper,
        }
    }

    /// The type that converts this one on contact.
    pub fn predator(self) -> AgentType {
        match self {
            AgentType::Rock => AgentType::Paper,
            AgentType::Paper => AgentType::Scissors,
            AgentType::Scissors => AgentType::Rock,
        }
    }

    pub fn is_predator_of(self, other: AgentType) -> bool {
        self.prey() == other
    }

    pub fn is_prey_for(self, other: AgentType) -> bool {
        self.predator() == other
    }

    /// Display name used in winner announcements.
    pub fn label(self) -> &'static str {
        match self {
            AgentType::Rock => "Rock",
            AgentType::Paper => "Paper",
            AgentType::Scissors => "Scissors",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            AgentType::Rock => "\u{26F0}\u{FE0F}",
            AgentType::Paper => "\u{1F4C4}",
            AgentType::Scissors => "\u{2702}\u{FE0F}",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per [`AgentType`], serialized as `{ rock, paper, scissors }`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerType<T> {
    pub rock: T,
    pub paper: T,
    pub scissors: T,
}

impl<T> PerType<T> {
    pub fn from_fn(mut f: impl FnMut(AgentType) -> T) -> Self {
        Self {
            rock: f(AgentType::Rock),
            paper: f(AgentType::Paper),
            scissors: f(AgentType::Scissors),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerType<U> {
        PerType {
            rock: f(&self.rock),
            paper: f(&self.paper),
            scissors: f(&self.scissors),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentType, &T)> {
        AgentType::ALL.into_iter().map(move |kind| (kind, &self[kind]))
    }
}

impl<T: Copy + std::iter::Sum<T>> PerType<T> {
    pub fn total(&self) -> T {
        [self.rock, self.paper, self.scissors].into_iter().sum()
    }
}

impl<T> Index<AgentType> for PerType<T> {
    type Output = T;

    fn index(&self, kind: AgentType) -> &T {
        match kind {
            AgentType::Rock => &self.rock,
            AgentType::Paper => &self.paper,
            AgentType::Scissors => &self.scissors,
        }
    }
}

impl<T> IndexMut<AgentType> for PerType<T> {
    fn index_mut(&mut self, kind: AgentType) -> &mut T {
        match kind {
            AgentType::Rock => &mut self.rock,
            AgentType::Paper => &mut self.paper,
            AgentType::Scissors => &mut self.scissors,
        }
    }
}

/// Closest candidate of a given role found during a neighbor scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborHit {
    /// Index into the agent slice the scan ran over. Only valid for the tick it was taken in.
    pub index: usize,
    pub position: [f64; 2],
    pub dist_sq: f64,
}

impl NeighborHit {
    /// Unit vector from `origin` toward the hit, or zero when they coincide.
    fn direction_from(&self, origin: [f64; 2]) -> [f64; 2] {
        let dist = self.dist_sq.sqrt();
        if dist > 0.0 {
            [
                (self.position[0] - origin[0]) / dist,
                (self.position[1] - origin[1]) / dist,
            ]
        } else {
            [0.0, 0.0]
        }
    }
}

/// Per-tick scratch state filled by a [`crate::spatial::SpatialIndex`] scan.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeighborScan {
    pub closest_prey: Option<NeighborHit>,
    pub closest_predator: Option<NeighborHit>,
    /// Sum of unit vectors pointing away from nearby same-type agents.
    pub separation: [f64; 2],
}

impl NeighborScan {
    pub fn prey_dist_sq(&self) -> f64 {
        self.closest_prey.map_or(f64::INFINITY, |hit| hit.dist_sq)
    }

    pub fn predator_dist_sq(&self) -> f64 {
        self.closest_predator.map_or(f64::INFINITY, |hit| hit.dist_sq)
    }

    pub fn has_targets(&self) -> bool {
        self.closest_prey.is_some() || self.closest_predator.is_some()
    }

    /// Record `other` as prey or predator if it is strictly closer than the current best.
    /// Equal distances keep the first candidate seen.
    pub(crate) fn offer_target(&mut self, seeker: AgentType, other: &Agent, index: usize, dist_sq: f64) {
        let hit = NeighborHit {
            index,
            position: other.position,
            dist_sq,
        };
        if other.kind == seeker.prey() {
            if dist_sq < self.prey_dist_sq() {
                self.closest_prey = Some(hit);
            }
        } else if other.kind == seeker.predator() && dist_sq < self.predator_dist_sq() {
            self.closest_predator = Some(hit);
        }
    }

    /// Push away from a same-type neighbor at offset `(dx, dy)`. Coincident neighbors are ignored.
    pub(crate) fn offer_separation(&mut self, delta: [f64; 2], dist_sq: f64, separation_dist_sq: f64) {
        if dist_sq > 0.0 && dist_sq < separation_dist_sq {
            let dist = dist_sq.sqrt();
            self.separation[0] -= delta[0] / dist;
            self.separation[1] -= delta[1] / dist;
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentUpdateError {
    #[error("agent {id} produced a non-finite position or velocity")]
    NonFiniteState { id: u32 },
}

#[derive(Clone, Debug)]
pub struct Agent {
    pub id: u32,
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    pub kind: AgentType,
    /// Type the current life started as; lifespans are attributed to it.
    pub original_kind: AgentType,
    pub size: f64,
    /// Simulation time (ms) at which the current life began.
    pub birth_ms: f64,
    pub death_ms: Option<f64>,
    pub scan: NeighborScan,
}

impl Agent {
    pub fn new(
        id: u32,
        kind: AgentType,
        position: [f64; 2],
        velocity: [f64; 2],
        size: f64,
        birth_ms: f64,
    ) -> Self {
        Self {
            id,
            position,
            velocity,
            kind,
            original_kind: kind,
            size,
            birth_ms,
            death_ms: None,
            scan: NeighborScan::default(),
        }
    }

    pub fn speed(&self) -> f64 {
        (self.velocity[0] * self.velocity[0] + self.velocity[1] * self.velocity[1]).sqrt()
    }

    pub fn is_predator_of(&self, other: &Agent) -> bool {
        self.kind.is_predator_of(other.kind)
    }

    pub fn is_prey_for(&self, other: &Agent) -> bool {
        self.kind.is_prey_for(other.kind)
    }

    /// Start a new life as `kind` at `now_ms`.
    pub(crate) fn reincarnate(&mut self, kind: AgentType, now_ms: f64) {
        self.kind = kind;
        self.original_kind = kind;
        self.birth_ms = now_ms;
        self.death_ms = None;
    }

    /// Turn the current [`NeighborScan`] into a new velocity, integrate one step
    /// and apply the boundary policy.
    ///
    /// Chasing and fleeing are blended by `chase_priority`; without targets the
    /// agent wanders with a small random turn. The state is only committed when
    /// the result is finite, so a failed update leaves the agent untouched.
    pub fn steer(
        &mut self,
        settings: &BehaviorSettings,
        playfield: Playfield,
        warp_edges: bool,
        rng: &mut impl Rng,
    ) -> Result<(), AgentUpdateError> {
        let scan = self.scan;
        let mut speed = settings.max_speed;
        let separation = [
            scan.separation[0] * settings.separation_strength,
            scan.separation[1] * settings.separation_strength,
        ];

        let desired = if scan.has_targets() {
            let prey = scan
                .closest_prey
                .map_or([0.0, 0.0], |hit| hit.direction_from(self.position));
            let away = scan.closest_predator.map_or([0.0, 0.0], |hit| {
                let toward = hit.direction_from(self.position);
                [-toward[0], -toward[1]]
            });
            let chase = settings.chase_priority;
            let flee = 1.0 - chase;
            let mut desired = [
                prey[0] * chase + away[0] * flee + separation[0],
                prey[1] * chase + away[1] * flee + separation[1],
            ];
            desired[0] += centered_noise(rng, settings.jiggle_factor);
            desired[1] += centered_noise(rng, settings.jiggle_factor);

            if scan.closest_predator.is_some() {
                speed *= settings.fleeing_speed_multiplier;
            } else {
                speed *= settings.chasing_speed_multiplier;
            }
            desired
        } else {
            let heading = if self.velocity[0].abs() < STATIONARY_SPEED_EPSILON
                && self.velocity[1].abs() < STATIONARY_SPEED_EPSILON
            {
                random_unit_vector(rng)
            } else {
                let angle = self.velocity[1].atan2(self.velocity[0])
                    + centered_noise(rng, WANDER_TURN_SPAN);
                let (sin, cos) = angle.sin_cos();
                [cos, sin]
            };
            [heading[0] + separation[0], heading[1] + separation[1]]
        };

        let mut velocity = self.velocity;
        let magnitude = (desired[0] * desired[0] + desired[1] * desired[1]).sqrt();
        if magnitude > MIN_STEERING_MAGNITUDE {
            velocity = [
                desired[0] / magnitude * speed,
                desired[1] / magnitude * speed,
            ];
        } else if !scan.has_targets() {
            // Separation can cancel the wander heading exactly; never freeze in place.
            let heading = random_unit_vector(rng);
            velocity = [heading[0] * speed, heading[1] * speed];
        }

        let mut position = [self.position[0] + velocity[0], self.position[1] + velocity[1]];
        if warp_edges {
            wrap_position(&mut position, playfield);
        } else {
            bounce(&mut position, &mut velocity, self.size, speed, playfield);
        }

        if !(position.iter().chain(velocity.iter()).all(|v| v.is_finite())) {
            return Err(AgentUpdateError::NonFiniteState { id: self.id });
        }
        self.position = position;
        self.velocity = velocity;
        Ok(())
    }
}

/// Teleport to the opposite edge once a coordinate leaves `[0, extent]`.
fn wrap_position(position: &mut [f64; 2], playfield: Playfield) {
    for (coord, extent) in position.iter_mut().zip(playfield.extents()) {
        if *coord < 0.0 {
            *coord = extent;
        } else if *coord > extent {
            *coord = 0.0;
        }
    }
}

/// Clamp into `[radius, extent - radius]`, reflect the crossed axis and keep the speed unchanged.
fn bounce(
    position: &mut [f64; 2],
    velocity: &mut [f64; 2],
    radius: f64,
    speed: f64,
    playfield: Playfield,
) {
    let mut bounced = false;
    for (axis, extent) in playfield.extents().into_iter().enumerate() {
        if position[axis] < radius {
            position[axis] = radius;
            velocity[axis] = -velocity[axis];
            bounced = true;
        } else if position[axis] > extent - radius {
            position[axis] = extent - radius;
            velocity[axis] = -velocity[axis];
            bounced = true;
        }
    }
    if bounced {
        let magnitude = (velocity[0] * velocity[0] + velocity[1] * velocity[1]).sqrt();
        if magnitude > 0.0 {
            velocity[0] = velocity[0] / magnitude * speed;
            velocity[1] = velocity[1] / magnitude * speed;
        }
    }
}
