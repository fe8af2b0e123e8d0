/// Largest valid playfield extent (world units) on either axis. Bounds the grid allocation.
pub const MAX_PLAYFIELD_EXTENT: f64 = 16_384.0;

/// Detection-radius multiplier treated as "unbounded" by the brute-force scan.
pub const INFINITE_DETECTION_VALUE: f64 = 101.0;

/// Detection-radius multiplier forced on every agent while optimized mode is active.
pub const OPTIMIZED_DETECTION_RADIUS_MULTIPLIER: f64 = 10.0;

/// Default edge length of a spatial grid cell.
pub const DEFAULT_GRID_CELL_SIZE: f64 = 50.0;

/// Most buckets a spatial grid may hold (1024 × 1024).
pub const MAX_GRID_CELLS: usize = 1 << 20;

/// Below this absolute velocity on both axes an agent counts as stationary.
pub const STATIONARY_SPEED_EPSILON: f64 = 0.01;

/// Desired-velocity magnitude under which steering is considered cancelled out.
pub const MIN_STEERING_MAGNITUDE: f64 = 0.01;

/// Full width of the random heading change applied while wandering (radians).
/// The turn is drawn from `[-WANDER_TURN_SPAN / 2, WANDER_TURN_SPAN / 2)`.
pub const WANDER_TURN_SPAN: f64 = 0.5;
