use crate::agent::{AgentType, PerType};
use crate::constants::{
    DEFAULT_GRID_CELL_SIZE, INFINITE_DETECTION_VALUE, MAX_GRID_CELLS,
    OPTIMIZED_DETECTION_RADIUS_MULTIPLIER,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rectangular playfield with its origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Playfield {
    pub width: f64,
    pub height: f64,
}

impl Playfield {
    pub fn extents(&self) -> [f64; 2] {
        [self.width, self.height]
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// `(rows, cols)` of a grid covering this playfield, at least one of each.
    /// `None` when the cell size is not positive or the grid would exceed
    /// [`MAX_GRID_CELLS`].
    pub fn grid_dimensions(&self, cell_size: f64) -> Option<(usize, usize)> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return None;
        }
        let cols = (self.width / cell_size).ceil().max(1.0);
        let rows = (self.height / cell_size).ceil().max(1.0);
        if rows * cols > MAX_GRID_CELLS as f64 {
            return None;
        }
        Some((rows as usize, cols as usize))
    }
}

impl Default for Playfield {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Movement and interaction knobs. Used globally and, resolved per type, by every agent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorSettings {
    /// Collision radius of an agent in world units.
    pub entity_size: f64,
    /// Base speed (world units per tick).
    pub max_speed: f64,
    /// Weight of chasing versus fleeing, in `[0, 1]`. 1 = pure chase.
    pub chase_priority: f64,
    /// Speed factor while prey (and no predator) is in sight.
    pub chasing_speed_multiplier: f64,
    /// Speed factor while a predator is in sight.
    pub fleeing_speed_multiplier: f64,
    /// Amplitude of per-axis random wobble applied while chasing or fleeing.
    pub jiggle_factor: f64,
    /// Same-type neighbors closer than `entity_size * this` push the agent away.
    pub separation_distance_multiplier: f64,
    /// Weight of the separation push.
    pub separation_strength: f64,
    /// Brute-force sight range as a multiple of `entity_size`.
    /// [`INFINITE_DETECTION_VALUE`] means unbounded.
    pub detection_radius_multiplier: f64,
    /// Conversion range as a multiple of the predator's `entity_size`.
    pub predation_radius_multiplier: f64,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            entity_size: 9.0,
            max_speed: 1.0,
            chase_priority: 0.5,
            chasing_speed_multiplier: 1.0,
            fleeing_speed_multiplier: 1.0,
            jiggle_factor: 0.2,
            separation_distance_multiplier: 0.1,
            separation_strength: 1.0,
            detection_radius_multiplier: 50.0,
            predation_radius_multiplier: 1.0,
        }
    }
}

impl BehaviorSettings {
    pub fn uses_infinite_detection(&self) -> bool {
        self.detection_radius_multiplier == INFINITE_DETECTION_VALUE
    }

    /// Squared sight range for an agent of `size`, infinite for the sentinel multiplier.
    pub fn detection_radius_sq(&self, size: f64) -> f64 {
        if self.uses_infinite_detection() {
            f64::INFINITY
        } else {
            let radius = size * self.detection_radius_multiplier;
            radius * radius
        }
    }

    pub fn separation_distance_sq(&self, size: f64) -> f64 {
        let dist = size * self.separation_distance_multiplier;
        dist * dist
    }

    pub fn predation_radius_sq(&self, size: f64) -> f64 {
        let radius = size * self.predation_radius_multiplier;
        radius * radius
    }

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if !(self.entity_size.is_finite() && self.entity_size > 0.0) {
            return Err(SimConfigError::InvalidEntitySize);
        }
        if !(self.max_speed.is_finite() && self.max_speed >= 0.0) {
            return Err(SimConfigError::InvalidMaxSpeed);
        }
        if !(self.chase_priority.is_finite() && (0.0..=1.0).contains(&self.chase_priority)) {
            return Err(SimConfigError::InvalidChasePriority);
        }
        if !(self.chasing_speed_multiplier.is_finite() && self.chasing_speed_multiplier >= 0.0) {
            return Err(SimConfigError::InvalidChasingSpeedMultiplier);
        }
        if !(self.fleeing_speed_multiplier.is_finite() && self.fleeing_speed_multiplier >= 0.0) {
            return Err(SimConfigError::InvalidFleeingSpeedMultiplier);
        }
        if !(self.jiggle_factor.is_finite() && self.jiggle_factor >= 0.0) {
            return Err(SimConfigError::InvalidJiggleFactor);
        }
        if !(self.separation_distance_multiplier.is_finite()
            && self.separation_distance_multiplier >= 0.0)
        {
            return Err(SimConfigError::InvalidSeparationDistance);
        }
        if !(self.separation_strength.is_finite() && self.separation_strength >= 0.0) {
            return Err(SimConfigError::InvalidSeparationStrength);
        }
        if !(self.detection_radius_multiplier.is_finite()
            && self.detection_radius_multiplier >= 0.0)
        {
            return Err(SimConfigError::InvalidDetectionRadius);
        }
        if !(self.predation_radius_multiplier.is_finite()
            && self.predation_radius_multiplier >= 0.0)
        {
            return Err(SimConfigError::InvalidPredationRadius);
        }
        Ok(())
    }
}

/// Partial per-type replacement of [`BehaviorSettings`]; unset fields fall back to the global value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chase_priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chasing_speed_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleeing_speed_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jiggle_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separation_distance_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separation_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_radius_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predation_radius_multiplier: Option<f64>,
}

impl BehaviorOverride {
    pub fn apply(&self, base: &BehaviorSettings) -> BehaviorSettings {
        BehaviorSettings {
            entity_size: self.entity_size.unwrap_or(base.entity_size),
            max_speed: self.max_speed.unwrap_or(base.max_speed),
            chase_priority: self.chase_priority.unwrap_or(base.chase_priority),
            chasing_speed_multiplier: self
                .chasing_speed_multiplier
                .unwrap_or(base.chasing_speed_multiplier),
            fleeing_speed_multiplier: self
                .fleeing_speed_multiplier
                .unwrap_or(base.fleeing_speed_multiplier),
            jiggle_factor: self.jiggle_factor.unwrap_or(base.jiggle_factor),
            separation_distance_multiplier: self
                .separation_distance_multiplier
                .unwrap_or(base.separation_distance_multiplier),
            separation_strength: self.separation_strength.unwrap_or(base.separation_strength),
            detection_radius_multiplier: self
                .detection_radius_multiplier
                .unwrap_or(base.detection_radius_multiplier),
            predation_radius_multiplier: self
                .predation_radius_multiplier
                .unwrap_or(base.predation_radius_multiplier),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for spawn positions, headings and steering noise.
    pub seed: u64,
    pub playfield: Playfield,
    /// Global behavior knobs.
    pub behavior: BehaviorSettings,
    /// When false, `type_overrides` is ignored and every type uses `behavior`.
    pub type_settings_enabled: bool,
    pub type_overrides: BTreeMap<AgentType, BehaviorOverride>,
    /// Wrap around the playfield edges instead of bouncing off them.
    pub warp_edges: bool,
    /// Use the spatial grid for neighbor and contact queries instead of brute force.
    pub optimized_mode: bool,
    /// Edge length of a spatial grid cell.
    pub grid_cell_size: f64,
    /// Running time between average-speed refreshes (ms).
    pub stats_refresh_interval_ms: f64,
    /// Running time between timeseries samples (ms).
    pub sample_interval_ms: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            playfield: Playfield::default(),
            behavior: BehaviorSettings::default(),
            type_settings_enabled: false,
            type_overrides: BTreeMap::new(),
            warp_edges: true,
            optimized_mode: false,
            grid_cell_size: DEFAULT_GRID_CELL_SIZE,
            stats_refresh_interval_ms: 250.0,
            sample_interval_ms: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimConfigError {
    #[error("playfield width/height must be finite and non-negative")]
    InvalidPlayfield,
    #[error("playfield extent ({actual}) exceeds supported maximum ({max})")]
    PlayfieldTooLarge { max: f64, actual: f64 },
    #[error("entity_size must be positive and finite")]
    InvalidEntitySize,
    #[error("max_speed must be finite and non-negative")]
    InvalidMaxSpeed,
    #[error("chase_priority must be finite and within [0,1]")]
    InvalidChasePriority,
    #[error("chasing_speed_multiplier must be finite and non-negative")]
    InvalidChasingSpeedMultiplier,
    #[error("fleeing_speed_multiplier must be finite and non-negative")]
    InvalidFleeingSpeedMultiplier,
    #[error("jiggle_factor must be finite and non-negative")]
    InvalidJiggleFactor,
    #[error("separation_distance_multiplier must be finite and non-negative")]
    InvalidSeparationDistance,
    #[error("separation_strength must be finite and non-negative")]
    InvalidSeparationStrength,
    #[error("detection_radius_multiplier must be finite and non-negative")]
    InvalidDetectionRadius,
    #[error("predation_radius_multiplier must be finite and non-negative")]
    InvalidPredationRadius,
    #[error("grid_cell_size must be positive and finite")]
    InvalidGridCellSize,
    #[error("grid_cell_size {cell_size} needs more than {max} cells to cover the playfield")]
    GridTooFine { cell_size: f64, max: usize },
    #[error("stats_refresh_interval_ms must be positive and finite")]
    InvalidStatsRefreshInterval,
    #[error("sample_interval_ms must be positive and finite")]
    InvalidSampleInterval,
    #[error("{kind} override: {source}")]
    InvalidTypeOverride {
        kind: AgentType,
        source: Box<SimConfigError>,
    },
}

impl SimConfig {
    pub const MAX_PLAYFIELD_EXTENT: f64 = crate::constants::MAX_PLAYFIELD_EXTENT;

    /// Upper bound on the population a single start may spawn.
    pub const MAX_TOTAL_AGENTS: usize = 100_000;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.validate_playfield()?;
        self.behavior.validate()?;
        self.validate_type_overrides()?;
        self.validate_intervals()?;
        Ok(())
    }

    fn validate_playfield(&self) -> Result<(), SimConfigError> {
        for extent in self.playfield.extents() {
            if !(extent.is_finite() && extent >= 0.0) {
                return Err(SimConfigError::InvalidPlayfield);
            }
            if extent > Self::MAX_PLAYFIELD_EXTENT {
                return Err(SimConfigError::PlayfieldTooLarge {
                    max: Self::MAX_PLAYFIELD_EXTENT,
                    actual: extent,
                });
            }
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return Err(SimConfigError::InvalidGridCellSize);
        }
        if self.playfield.grid_dimensions(self.grid_cell_size).is_none() {
            return Err(SimConfigError::GridTooFine {
                cell_size: self.grid_cell_size,
                max: MAX_GRID_CELLS,
            });
        }
        Ok(())
    }

    // Overrides are checked even while disabled so toggling them on can never
    // expose an invalid combination.
    fn validate_type_overrides(&self) -> Result<(), SimConfigError> {
        for (&kind, over) in &self.type_overrides {
            over.apply(&self.behavior)
                .validate()
                .map_err(|source| SimConfigError::InvalidTypeOverride {
                    kind,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn validate_intervals(&self) -> Result<(), SimConfigError> {
        if !(self.stats_refresh_interval_ms.is_finite() && self.stats_refresh_interval_ms > 0.0) {
            return Err(SimConfigError::InvalidStatsRefreshInterval);
        }
        if !(self.sample_interval_ms.is_finite() && self.sample_interval_ms > 0.0) {
            return Err(SimConfigError::InvalidSampleInterval);
        }
        Ok(())
    }

    /// Effective settings for one type: the override when type settings are on,
    /// with the detection multiplier pinned while optimized mode is active.
    pub fn resolve_settings(&self, kind: AgentType) -> BehaviorSettings {
        let mut settings = match self.type_overrides.get(&kind) {
            Some(over) if self.type_settings_enabled => over.apply(&self.behavior),
            _ => self.behavior,
        };
        if self.optimized_mode {
            settings.detection_radius_multiplier = OPTIMIZED_DETECTION_RADIUS_MULTIPLIER;
        }
        settings
    }

    pub fn resolve_all(&self) -> PerType<BehaviorSettings> {
        PerType::from_fn(|kind| self.resolve_settings(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_default() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_invalid_playfield() {
        let config = SimConfig {
            playfield: Playfield {
                width: -1.0,
                height: 100.0,
            },
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(SimConfigError::InvalidPlayfield));

        let config = SimConfig {
            playfield: Playfield {
                width: 100.0,
                height: SimConfig::MAX_PLAYFIELD_EXTENT + 1.0,
            },
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::PlayfieldTooLarge { .. })
        ));
    }

    #[test]
    fn validate_accepts_zero_area_playfield() {
        let config = SimConfig {
            playfield: Playfield {
                width: 0.0,
                height: 0.0,
            },
            ..SimConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_chase_priority_out_of_range() {
        let mut config = SimConfig::default();
        config.behavior.chase_priority = 1.5;
        assert_eq!(config.validate(), Err(SimConfigError::InvalidChasePriority));
        config.behavior.chase_priority = f64::NAN;
        assert_eq!(config.validate(), Err(SimConfigError::InvalidChasePriority));
    }

    #[test]
    fn validate_rejects_non_positive_grid_cell() {
        let config = SimConfig {
            grid_cell_size: 0.0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(SimConfigError::InvalidGridCellSize));
    }

    #[test]
    fn validate_rejects_grid_cell_too_small_for_playfield() {
        let config = SimConfig {
            grid_cell_size: 1e-9,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::GridTooFine { max: MAX_GRID_CELLS, .. })
        ));

        // 1024 × 1024 one-unit cells is exactly the cap.
        let config = SimConfig {
            playfield: Playfield {
                width: 1024.0,
                height: 1024.0,
            },
            grid_cell_size: 1.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn grid_dimensions_round_up_and_never_drop_below_one() {
        let field = Playfield {
            width: 800.0,
            height: 610.0,
        };
        assert_eq!(field.grid_dimensions(50.0), Some((13, 16)));
        assert_eq!(Playfield::default().grid_dimensions(10_000.0), Some((1, 1)));
        assert_eq!(field.grid_dimensions(0.0), None);
        assert_eq!(field.grid_dimensions(f64::MIN_POSITIVE), None);
    }

    #[test]
    fn validate_names_the_offending_type_override() {
        let mut config = SimConfig::default();
        config.type_overrides.insert(
            AgentType::Paper,
            BehaviorOverride {
                entity_size: Some(0.0),
                ..BehaviorOverride::default()
            },
        );
        assert_eq!(
            config.validate(),
            Err(SimConfigError::InvalidTypeOverride {
                kind: AgentType::Paper,
                source: Box::new(SimConfigError::InvalidEntitySize),
            })
        );
    }

    #[test]
    fn resolve_ignores_overrides_unless_enabled() {
        let mut config = SimConfig::default();
        config.type_overrides.insert(
            AgentType::Rock,
            BehaviorOverride {
                max_speed: Some(3.0),
                ..BehaviorOverride::default()
            },
        );
        assert_eq!(config.resolve_settings(AgentType::Rock).max_speed, 1.0);
        config.type_settings_enabled = true;
        let resolved = config.resolve_all();
        assert_eq!(resolved[AgentType::Rock].max_speed, 3.0);
        assert_eq!(resolved[AgentType::Paper].max_speed, 1.0);
        // Untouched fields still come from the global settings.
        assert_eq!(resolved[AgentType::Rock].entity_size, 9.0);
    }

    #[test]
    fn optimized_mode_pins_detection_radius() {
        let mut config = SimConfig::default();
        config.type_settings_enabled = true;
        config.type_overrides.insert(
            AgentType::Scissors,
            BehaviorOverride {
                detection_radius_multiplier: Some(INFINITE_DETECTION_VALUE),
                ..BehaviorOverride::default()
            },
        );
        config.optimized_mode = true;
        for (_, settings) in config.resolve_all().iter() {
            assert_eq!(
                settings.detection_radius_multiplier,
                OPTIMIZED_DETECTION_RADIUS_MULTIPLIER
            );
        }
    }

    #[test]
    fn infinite_detection_sentinel_is_unbounded() {
        let settings = BehaviorSettings {
            detection_radius_multiplier: INFINITE_DETECTION_VALUE,
            ..BehaviorSettings::default()
        };
        assert!(settings.detection_radius_sq(9.0).is_infinite());
        let finite = BehaviorSettings::default();
        assert_eq!(finite.detection_radius_sq(2.0), 10_000.0);
    }

    #[test]
    fn partial_config_json_deserializes_with_defaults() {
        let json = r#"{
            "seed": 7,
            "playfield": { "width": 400.0, "height": 300.0 },
            "behavior": { "max_speed": 2.5 },
            "type_settings_enabled": true,
            "type_overrides": { "scissors": { "jiggle_factor": 0.0 } }
        }"#;
        let cfg: SimConfig = serde_json::from_str(json).expect("partial config should parse");
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.behavior.max_speed, 2.5);
        assert_eq!(cfg.behavior.entity_size, 9.0);
        assert!(cfg.warp_edges);
        assert!(!cfg.optimized_mode);
        assert_eq!(cfg.grid_cell_size, DEFAULT_GRID_CELL_SIZE);
        assert_eq!(cfg.resolve_settings(AgentType::Scissors).jiggle_factor, 0.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialize_rejects_unknown_agent_type_key() {
        let json = r#"{ "type_overrides": { "lizard": {} } }"#;
        assert!(serde_json::from_str::<SimConfig>(json).is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = SimConfig {
            optimized_mode: true,
            warp_edges: false,
            ..SimConfig::default()
        };
        config.type_overrides.insert(
            AgentType::Rock,
            BehaviorOverride {
                predation_radius_multiplier: Some(2.0),
                ..BehaviorOverride::default()
            },
        );
        let json = serde_json::to_string(&config).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
